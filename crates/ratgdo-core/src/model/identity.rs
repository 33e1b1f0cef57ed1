use std::fmt;

use serde::{Deserialize, Serialize};

/// Model and serial number announced in the device's heartbeat title,
/// e.g. `"RATGDO32DISCO ABC123"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub model: String,
    pub serial: String,
}

impl Identity {
    /// Split a title into model and serial.
    ///
    /// Returns `None` unless the title holds at least two
    /// whitespace-separated tokens. Tokens after the second are ignored.
    pub fn from_title(title: &str) -> Option<Self> {
        let mut tokens = title.split_whitespace();
        let model = tokens.next()?;
        let serial = tokens.next()?;
        Some(Self {
            model: model.to_owned(),
            serial: serial.to_owned(),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.model, self.serial)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn splits_model_and_serial() {
        let identity = Identity::from_title("RATGDO32DISCO ABC123");
        assert_eq!(
            identity,
            Some(Identity {
                model: "RATGDO32DISCO".into(),
                serial: "ABC123".into(),
            })
        );
    }

    #[test]
    fn tolerates_extra_whitespace_and_tokens() {
        let identity = Identity::from_title("  RATGDO32   ABC123 rev2 ").unwrap();
        assert_eq!(identity.model, "RATGDO32");
        assert_eq!(identity.serial, "ABC123");
    }

    #[test]
    fn rejects_single_token_and_empty() {
        assert_eq!(Identity::from_title("RATGDO32DISCO"), None);
        assert_eq!(Identity::from_title(""), None);
        assert_eq!(Identity::from_title("   "), None);
    }
}
