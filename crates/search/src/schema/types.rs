//! Property type groups from the FtM type registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The type group of an FtM property.
///
/// The group determines three things: the Elasticsearch field type of the
/// `properties.<name>` field, the group field its values are copied into
/// (if any), and how the matcher scores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeGroup {
    Name,
    Country,
    Language,
    Email,
    Phone,
    Date,
    Address,
    Identifier,
    Ip,
    Url,
    Entity,
    Checksum,
    Mimetype,
    Gender,
    Topic,
    Number,
    Text,
    Html,
    Json,
    /// Plain string values with no group field.
    String,
}

impl TypeGroup {
    /// The group field values of this type are copied into, if any.
    pub fn group_field(&self) -> Option<&'static str> {
        match self {
            TypeGroup::Name => Some("names"),
            TypeGroup::Country => Some("countries"),
            TypeGroup::Language => Some("languages"),
            TypeGroup::Email => Some("emails"),
            TypeGroup::Phone => Some("phones"),
            TypeGroup::Date => Some("dates"),
            TypeGroup::Address => Some("addresses"),
            TypeGroup::Identifier => Some("identifiers"),
            TypeGroup::Ip => Some("ips"),
            TypeGroup::Url => Some("urls"),
            TypeGroup::Entity => Some("entities"),
            TypeGroup::Checksum => Some("checksums"),
            TypeGroup::Mimetype => Some("mimetypes"),
            TypeGroup::Gender => Some("genders"),
            TypeGroup::Topic => Some("topics"),
            TypeGroup::Number
            | TypeGroup::Text
            | TypeGroup::Html
            | TypeGroup::Json
            | TypeGroup::String => None,
        }
    }

    /// All group fields, in mapping order.
    pub fn group_fields() -> &'static [&'static str] {
        &[
            "names",
            "countries",
            "languages",
            "emails",
            "phones",
            "dates",
            "addresses",
            "identifiers",
            "ips",
            "urls",
            "entities",
            "checksums",
            "mimetypes",
            "genders",
            "topics",
        ]
    }

    /// Long-form text content, indexed into `content` rather than `text`.
    pub fn is_text(&self) -> bool {
        matches!(self, TypeGroup::Text | TypeGroup::Html | TypeGroup::Json)
    }

    /// Duplicated into `numeric.<field>` for sorting and aggregation.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeGroup::Number | TypeGroup::Date)
    }

    /// Ranking used to order match-query scoring clauses. Higher values
    /// identify an entity more specifically and are emitted first.
    pub fn specificity(&self) -> u8 {
        match self {
            TypeGroup::Identifier => 10,
            TypeGroup::Checksum => 9,
            TypeGroup::Phone => 8,
            TypeGroup::Email => 8,
            TypeGroup::Ip => 7,
            TypeGroup::Url => 7,
            TypeGroup::Address => 6,
            TypeGroup::Date => 5,
            TypeGroup::Entity => 4,
            TypeGroup::Country => 3,
            TypeGroup::Mimetype => 2,
            TypeGroup::Gender => 2,
            TypeGroup::Topic => 2,
            TypeGroup::Language => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for TypeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeGroup::Name => "name",
            TypeGroup::Country => "country",
            TypeGroup::Language => "language",
            TypeGroup::Email => "email",
            TypeGroup::Phone => "phone",
            TypeGroup::Date => "date",
            TypeGroup::Address => "address",
            TypeGroup::Identifier => "identifier",
            TypeGroup::Ip => "ip",
            TypeGroup::Url => "url",
            TypeGroup::Entity => "entity",
            TypeGroup::Checksum => "checksum",
            TypeGroup::Mimetype => "mimetype",
            TypeGroup::Gender => "gender",
            TypeGroup::Topic => "topic",
            TypeGroup::Number => "number",
            TypeGroup::Text => "text",
            TypeGroup::Html => "html",
            TypeGroup::Json => "json",
            TypeGroup::String => "string",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TypeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(TypeGroup::Name),
            "country" => Ok(TypeGroup::Country),
            "language" => Ok(TypeGroup::Language),
            "email" => Ok(TypeGroup::Email),
            "phone" => Ok(TypeGroup::Phone),
            "date" => Ok(TypeGroup::Date),
            "address" => Ok(TypeGroup::Address),
            "identifier" => Ok(TypeGroup::Identifier),
            "ip" => Ok(TypeGroup::Ip),
            "url" => Ok(TypeGroup::Url),
            "entity" => Ok(TypeGroup::Entity),
            "checksum" => Ok(TypeGroup::Checksum),
            "mimetype" => Ok(TypeGroup::Mimetype),
            "gender" => Ok(TypeGroup::Gender),
            "topic" => Ok(TypeGroup::Topic),
            "number" => Ok(TypeGroup::Number),
            "text" => Ok(TypeGroup::Text),
            "html" => Ok(TypeGroup::Html),
            "json" => Ok(TypeGroup::Json),
            "string" => Ok(TypeGroup::String),
            _ => Err(format!("unknown type group: {}", s)),
        }
    }
}

/// A resolved property descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    /// The property name (e.g. `birthDate`).
    pub name: String,
    /// The type group driving field typing and copy_to wiring.
    pub group: TypeGroup,
    /// Whether the matcher may score on this property.
    pub matchable: bool,
}

impl PropertySpec {
    /// Long-form text content?
    pub fn is_text(&self) -> bool {
        self.group.is_text()
    }

    /// Duplicated into `numeric.<field>`?
    pub fn is_numeric(&self) -> bool {
        self.group.is_numeric()
    }
}
