use serde::{Deserialize, Serialize};

/// Payment gateway as reported by the directory for a country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub id: i32,
    pub name: String,
    pub data_format_supported: String,
    /// Lower is preferred.
    pub priority: i32,
    pub country_id: i32,
}

/// Payload formats accepted on the message bus and on the HTTP intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Xml,
}

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// One accepted content type: how it is decoded and where its events go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRoute {
    pub content_type: &'static str,
    pub format: DataFormat,
    pub topic: &'static str,
}

/// Every accepted content type. Supporting a new one is a new row here.
pub const FORMAT_ROUTES: &[FormatRoute] = &[
    FormatRoute {
        content_type: CONTENT_TYPE_JSON,
        format: DataFormat::Json,
        topic: "transactions.json",
    },
    FormatRoute {
        content_type: "text/xml",
        format: DataFormat::Xml,
        topic: "transactions.soap",
    },
    FormatRoute {
        content_type: "application/xml",
        format: DataFormat::Xml,
        topic: "transactions.soap",
    },
];

impl FormatRoute {
    /// Exact, case-sensitive match on the bare media type.
    pub fn for_content_type(content_type: &str) -> Option<&'static FormatRoute> {
        FORMAT_ROUTES.iter().find(|route| route.content_type == content_type)
    }
}

impl DataFormat {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        FormatRoute::for_content_type(content_type).map(|route| route.format)
    }
}
