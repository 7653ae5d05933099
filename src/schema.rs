use crate::error::CasebridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Mandatory,
    Optional,
}

/// Immutable classification config mapping source field spellings onto the
/// canonical case-metadata schema. Built once per run and passed explicitly
/// into the extractor and the table builder.
///
/// A source spelling may alias at most one canonical name; the constructor
/// rejects anything else, so duplicate-alias resolution never arises at
/// runtime (open question for domain owners: whether a first-declared-wins
/// fallback should be allowed instead).
#[derive(Debug, Clone)]
pub struct FieldSchema {
    mandatory: Vec<String>,
    optional: Vec<String>,
    aliases: Vec<(String, String)>,
    ignore: Vec<String>,
    user_defined_container: String,
}

impl FieldSchema {
    pub fn new(
        mandatory: Vec<String>,
        optional: Vec<String>,
        aliases: Vec<(String, String)>,
        ignore: Vec<String>,
        user_defined_container: String,
    ) -> Result<Self, CasebridgeError> {
        if mandatory.is_empty() {
            return Err(CasebridgeError::SchemaConflict(
                "at least one mandatory field is required".to_string(),
            ));
        }
        for (index, name) in mandatory.iter().enumerate() {
            if mandatory[..index].contains(name) {
                return Err(CasebridgeError::SchemaConflict(format!(
                    "mandatory field declared twice: {name}"
                )));
            }
        }
        for (index, name) in optional.iter().enumerate() {
            if optional[..index].contains(name) {
                return Err(CasebridgeError::SchemaConflict(format!(
                    "optional field declared twice: {name}"
                )));
            }
            if mandatory.contains(name) {
                return Err(CasebridgeError::SchemaConflict(format!(
                    "field declared both mandatory and optional: {name}"
                )));
            }
        }
        for (index, (source, canonical)) in aliases.iter().enumerate() {
            if !mandatory.contains(canonical) && !optional.contains(canonical) {
                return Err(CasebridgeError::SchemaConflict(format!(
                    "alias {source} targets undeclared field {canonical}"
                )));
            }
            if mandatory.contains(source) || optional.contains(source) {
                return Err(CasebridgeError::SchemaConflict(format!(
                    "alias {source} shadows a canonical field name"
                )));
            }
            if aliases[..index].iter().any(|(other, _)| other == source) {
                return Err(CasebridgeError::SchemaConflict(format!(
                    "alias declared twice: {source}"
                )));
            }
        }

        Ok(Self {
            mandatory,
            optional,
            aliases,
            ignore,
            user_defined_container,
        })
    }

    /// Field map for the Clarity sample view as ingested by Connected
    /// Insights. Custom fields attached to a test definition can be mandatory
    /// for case ingestion; they stay optional here until queried per
    /// deployment.
    pub fn default_clarity() -> Self {
        Self::new(
            vec![
                "Sample_ID".to_string(),
                "Tumor_Type".to_string(),
                "Case_ID".to_string(),
            ],
            vec![
                "Sample_Type".to_string(),
                "Sample_Classification".to_string(),
                "Tags".to_string(),
                "Test_Definition".to_string(),
                "Sample Name(s)".to_string(),
            ],
            vec![("id".to_string(), "Sample_ID".to_string())],
            vec!["container".to_string()],
            "userDefinedFields".to_string(),
        )
        .expect("default clarity schema is internally consistent")
    }

    pub fn mandatory(&self) -> &[String] {
        &self.mandatory
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored == name)
    }

    pub fn user_defined_container(&self) -> &str {
        &self.user_defined_container
    }

    /// Resolve a source field name to its canonical name and class.
    /// Unknown names return `None` and are dropped by the extractor.
    pub fn classify(&self, name: &str) -> Option<(FieldClass, &str)> {
        if let Some(canonical) = self.mandatory.iter().find(|field| *field == name) {
            return Some((FieldClass::Mandatory, canonical));
        }
        if let Some(canonical) = self.optional.iter().find(|field| *field == name) {
            return Some((FieldClass::Optional, canonical));
        }
        let canonical = self
            .aliases
            .iter()
            .find(|(source, _)| source == name)
            .map(|(_, canonical)| canonical.as_str())?;
        if self.mandatory.iter().any(|field| field == canonical) {
            Some((FieldClass::Mandatory, canonical))
        } else {
            Some((FieldClass::Optional, canonical))
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn classify_default_schema() {
        let schema = FieldSchema::default_clarity();
        assert_eq!(
            schema.classify("Tumor_Type"),
            Some((FieldClass::Mandatory, "Tumor_Type"))
        );
        assert_eq!(
            schema.classify("Sample_Type"),
            Some((FieldClass::Optional, "Sample_Type"))
        );
        assert_eq!(
            schema.classify("id"),
            Some((FieldClass::Mandatory, "Sample_ID"))
        );
        assert_eq!(schema.classify("barcode"), None);
    }

    #[test]
    fn reject_field_in_both_classes() {
        let err = FieldSchema::new(
            vec!["Sample_ID".to_string()],
            vec!["Sample_ID".to_string()],
            vec![],
            vec![],
            "userDefinedFields".to_string(),
        )
        .unwrap_err();
        assert_matches!(err, CasebridgeError::SchemaConflict(_));
    }

    #[test]
    fn reject_duplicate_alias() {
        let err = FieldSchema::new(
            vec!["Sample_ID".to_string(), "Case_ID".to_string()],
            vec![],
            vec![
                ("id".to_string(), "Sample_ID".to_string()),
                ("id".to_string(), "Case_ID".to_string()),
            ],
            vec![],
            "userDefinedFields".to_string(),
        )
        .unwrap_err();
        assert_matches!(err, CasebridgeError::SchemaConflict(_));
    }

    #[test]
    fn reject_alias_to_unknown_field() {
        let err = FieldSchema::new(
            vec!["Sample_ID".to_string()],
            vec![],
            vec![("id".to_string(), "Subject_ID".to_string())],
            vec![],
            "userDefinedFields".to_string(),
        )
        .unwrap_err();
        assert_matches!(err, CasebridgeError::SchemaConflict(_));
    }
}
