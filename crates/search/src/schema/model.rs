//! Serializable model description and the built-in default model.
//!
//! A model file is a JSON map of schema name to schema spec. The built-in
//! default covers the core FtM schemata; deployments with a customized
//! model load their own file through [`ModelSpec`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A property in a model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Type group name (`name`, `country`, `identifier`, ...).
    #[serde(rename = "type")]
    pub type_: String,
    /// Whether the matcher may score on this property. Defaults to true
    /// for grouped types.
    #[serde(default)]
    pub matchable: Option<bool>,
}

/// A schema in a model file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Parent schemata this one inherits properties from.
    #[serde(default)]
    pub extends: Vec<String>,
    /// Abstract schemata are never indexed directly.
    #[serde(default, rename = "abstract")]
    pub abstract_: bool,
    /// Whether entities of this schema participate in matching.
    #[serde(default)]
    pub matchable: bool,
    /// Own (non-inherited) properties.
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
}

/// A complete model description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSpec {
    /// All schemata by name.
    pub schemata: BTreeMap<String, SchemaSpec>,
}

impl ModelSpec {
    /// Parses a model description from JSON.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// The built-in default model: the core FtM schemata with the
    /// properties the search core cares about. Not a complete FtM model;
    /// a deployment may load the full one instead.
    pub fn default_model() -> Self {
        let mut spec = ModelSpec::default();
        spec.add(
            "Thing",
            &[],
            true,
            false,
            &[
                ("name", "name"),
                ("alias", "name"),
                ("previousName", "name"),
                ("summary", "text"),
                ("description", "text"),
                ("country", "country"),
                ("address", "address"),
                ("addressEntity", "entity"),
                ("sourceUrl", "url"),
                ("keywords", "topic"),
            ],
        );
        spec.add(
            "Analyzable",
            &[],
            true,
            false,
            &[
                ("detectedLanguage", "language"),
                ("detectedCountry", "country"),
                ("peopleMentioned", "name"),
                ("companiesMentioned", "name"),
                ("namesMentioned", "name"),
                ("ibanMentioned", "identifier"),
                ("ipMentioned", "ip"),
                ("emailMentioned", "email"),
                ("phoneMentioned", "phone"),
                ("locationMentioned", "address"),
                ("indexText", "text"),
            ],
        );
        spec.add(
            "LegalEntity",
            &["Thing"],
            false,
            true,
            &[
                ("email", "email"),
                ("phone", "phone"),
                ("website", "url"),
                ("legalForm", "string"),
                ("incorporationDate", "date"),
                ("dissolutionDate", "date"),
                ("taxNumber", "identifier"),
                ("registrationNumber", "identifier"),
                ("idNumber", "identifier"),
                ("jurisdiction", "country"),
                ("mainCountry", "country"),
                ("status", "string"),
                ("sector", "string"),
                ("classification", "string"),
                ("topics", "topic"),
            ],
        );
        spec.add(
            "Person",
            &["LegalEntity"],
            false,
            true,
            &[
                ("title", "string"),
                ("firstName", "string"),
                ("lastName", "string"),
                ("birthDate", "date"),
                ("birthPlace", "string"),
                ("deathDate", "date"),
                ("nationality", "country"),
                ("gender", "gender"),
                ("passportNumber", "identifier"),
                ("position", "string"),
            ],
        );
        spec.add("Organization", &["LegalEntity"], false, true, &[]);
        spec.add(
            "Company",
            &["Organization", "Asset"],
            false,
            true,
            &[
                ("cikCode", "identifier"),
                ("vatCode", "identifier"),
                ("ticker", "identifier"),
                ("capital", "number"),
            ],
        );
        spec.add("PublicBody", &["Organization"], false, true, &[]);
        spec.add(
            "Asset",
            &["Thing"],
            true,
            false,
            &[("amount", "number"), ("currency", "string")],
        );
        spec.add(
            "RealEstate",
            &["Asset"],
            false,
            false,
            &[
                ("latitude", "number"),
                ("longitude", "number"),
                ("registrationNumber", "identifier"),
            ],
        );
        spec.add(
            "Address",
            &["Thing"],
            false,
            false,
            &[
                ("full", "address"),
                ("street", "string"),
                ("city", "string"),
                ("postalCode", "string"),
                ("latitude", "number"),
                ("longitude", "number"),
            ],
        );
        spec.add(
            "Document",
            &["Thing", "Analyzable"],
            false,
            false,
            &[
                ("title", "name"),
                ("fileName", "string"),
                ("mimeType", "mimetype"),
                ("contentHash", "checksum"),
                ("fileSize", "number"),
                ("extension", "string"),
                ("encoding", "string"),
                ("date", "date"),
                ("authoredAt", "date"),
                ("publishedAt", "date"),
                ("parent", "entity"),
                ("ancestors", "entity"),
                ("processingStatus", "string"),
                ("author", "string"),
                ("generator", "string"),
                ("bodyText", "text"),
            ],
        );
        spec.add(
            "Email",
            &["Document"],
            false,
            false,
            &[
                ("subject", "name"),
                ("sender", "email"),
                ("recipients", "email"),
                ("headers", "json"),
                ("inReplyToEmail", "entity"),
            ],
        );
        spec.add("Folder", &["Document"], false, false, &[]);
        spec.add(
            "Pages",
            &["Document"],
            false,
            false,
            &[("pdfHash", "checksum")],
        );
        spec.add(
            "Page",
            &["Document"],
            false,
            false,
            &[("index", "number"), ("document", "entity")],
        );
        spec.add(
            "Interval",
            &[],
            true,
            false,
            &[
                ("startDate", "date"),
                ("endDate", "date"),
                ("date", "date"),
                ("summary", "text"),
                ("description", "text"),
                ("recordId", "identifier"),
                ("sourceUrl", "url"),
            ],
        );
        spec.add("Event", &["Interval", "Thing"], false, false, &[]);
        spec.add(
            "Ownership",
            &["Interval"],
            false,
            false,
            &[
                ("owner", "entity"),
                ("asset", "entity"),
                ("percentage", "number"),
                ("role", "string"),
            ],
        );
        spec.add(
            "Membership",
            &["Interval"],
            false,
            false,
            &[
                ("member", "entity"),
                ("organization", "entity"),
                ("role", "string"),
            ],
        );
        spec
    }

    fn add(
        &mut self,
        name: &str,
        extends: &[&str],
        abstract_: bool,
        matchable: bool,
        properties: &[(&str, &str)],
    ) {
        let properties = properties
            .iter()
            .map(|(prop, type_)| {
                (
                    prop.to_string(),
                    PropertySpec {
                        type_: type_.to_string(),
                        matchable: None,
                    },
                )
            })
            .collect();
        self.schemata.insert(
            name.to_string(),
            SchemaSpec {
                extends: extends.iter().map(|s| s.to_string()).collect(),
                abstract_,
                matchable,
                properties,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_schemata() {
        let spec = ModelSpec::default_model();
        for name in ["Thing", "Person", "Company", "Document", "Pages", "Page"] {
            assert!(spec.schemata.contains_key(name), "missing {}", name);
        }
        let person = &spec.schemata["Person"];
        assert_eq!(person.extends, vec!["LegalEntity"]);
        assert!(person.matchable);
        assert!(!person.abstract_);
    }

    #[test]
    fn test_json_round_trip() {
        let spec = ModelSpec::default_model();
        let raw = serde_json::to_string(&spec).unwrap();
        let parsed = ModelSpec::from_json(&raw).unwrap();
        assert_eq!(parsed.schemata.len(), spec.schemata.len());
        assert!(parsed.schemata["Interval"].abstract_);
    }
}
