use crate::domain::{SampleId, SampleRecord};
use crate::error::CasebridgeError;

/// Selection criterion for one run: explicit sample ids, a Clarity LIMS
/// sample project, or both (combined with AND — selection narrows).
#[derive(Debug, Clone, Default)]
pub struct SampleSelection {
    pub sample_ids: Vec<SampleId>,
    pub lims_project: Option<String>,
}

impl SampleSelection {
    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty() && self.lims_project.is_none()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.sample_ids.is_empty() {
            let ids = self
                .sample_ids
                .iter()
                .map(SampleId::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("samples {ids}"));
        }
        if let Some(project) = &self.lims_project {
            parts.push(format!("Clarity LIMS sample project {project}"));
        }
        parts.join(" in ")
    }
}

#[derive(Debug)]
pub struct Selection<'a> {
    pub records: Vec<&'a SampleRecord>,
    /// Requested ids that matched more than one record. Ambiguous data is
    /// surfaced, not blocking.
    pub ambiguous: Vec<(SampleId, usize)>,
}

/// Filter the full sample table down to the records matching the selection.
/// Every requested id must match at least one record; zero matches for an
/// id, or an empty overall result, is fatal.
pub fn select_samples<'a>(
    records: &'a [SampleRecord],
    selection: &SampleSelection,
) -> Result<Selection<'a>, CasebridgeError> {
    if selection.is_empty() {
        return Err(CasebridgeError::InvalidSelection);
    }

    let mut matched = Vec::new();
    let mut counts = vec![0usize; selection.sample_ids.len()];
    for record in records {
        let id_ok = selection.sample_ids.is_empty()
            || record
                .id()
                .is_some_and(|id| selection.sample_ids.iter().any(|want| want.as_str() == id));
        let project_ok = selection
            .lims_project
            .as_deref()
            .is_none_or(|project| record.lims_project() == Some(project));
        if id_ok && project_ok {
            matched.push(record);
            if let Some(id) = record.id() {
                for (index, want) in selection.sample_ids.iter().enumerate() {
                    if want.as_str() == id {
                        counts[index] += 1;
                    }
                }
            }
        }
    }

    let mut ambiguous = Vec::new();
    for (want, count) in selection.sample_ids.iter().zip(&counts) {
        match count {
            0 => return Err(CasebridgeError::NoMatch(want.to_string())),
            1 => {}
            many => {
                tracing::warn!(sample_id = %want, matches = many, "multiple records for sample id");
                ambiguous.push((want.clone(), *many));
            }
        }
    }

    if matched.is_empty() {
        return Err(CasebridgeError::NoMatch(selection.describe()));
    }

    Ok(Selection {
        records: matched,
        ambiguous,
    })
}
