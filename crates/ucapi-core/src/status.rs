//! Response status codes.

use serde::{Deserialize, Serialize};

/// Status code carried in the `code` field of every response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum StatusCode {
    #[default]
    Ok,
    BadRequest,
    Unauthorized,
    NotFound,
    ServerError,
    ServiceUnavailable,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::ServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.as_u16()
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            200 => Ok(Self::Ok),
            400 => Ok(Self::BadRequest),
            401 => Ok(Self::Unauthorized),
            404 => Ok(Self::NotFound),
            500 => Ok(Self::ServerError),
            503 => Ok(Self::ServiceUnavailable),
            other => Err(format!("unsupported status code {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values() {
        assert_eq!(StatusCode::Ok.as_u16(), 200);
        assert_eq!(StatusCode::BadRequest.as_u16(), 400);
        assert_eq!(StatusCode::Unauthorized.as_u16(), 401);
        assert_eq!(StatusCode::NotFound.as_u16(), 404);
        assert_eq!(StatusCode::ServerError.as_u16(), 500);
    }

    #[test]
    fn serializes_as_integer() {
        assert_eq!(serde_json::to_string(&StatusCode::NotFound).unwrap(), "404");
        let code: StatusCode = serde_json::from_str("200").unwrap();
        assert_eq!(code, StatusCode::Ok);
    }

    #[test]
    fn rejects_unknown_code() {
        assert!(serde_json::from_str::<StatusCode>("418").is_err());
    }

    #[test]
    fn default_is_ok() {
        assert!(StatusCode::default().is_ok());
    }
}
