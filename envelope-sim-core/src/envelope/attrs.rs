use crate::imports::*;
use std::fmt;

/// How the train drives along an envelope part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeProfile {
    Accelerating,
    ConstantSpeed,
    Braking,
    Coasting,
    /// Max effort traction recovering from a speed drop on a plateau
    CatchingUp,
}

/// Why an envelope part has the shape it has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalMeaning {
    SpeedLimit,
    Stop,
    MarecoSpeedLimit,
    CapacitySpeedLimit,
}

/// Typed attributes of an envelope part, at most one value per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvelopeAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<EnvelopeProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<PhysicalMeaning>,
}

impl EnvelopeAttrs {
    pub fn new(profile: EnvelopeProfile) -> Self {
        Self {
            profile: Some(profile),
            meaning: None,
        }
    }

    pub fn with_meaning(mut self, meaning: PhysicalMeaning) -> Self {
        self.meaning = Some(meaning);
        self
    }

    pub fn has_profile(&self, profile: EnvelopeProfile) -> bool {
        self.profile == Some(profile)
    }

    pub fn has_meaning(&self, meaning: PhysicalMeaning) -> bool {
        self.meaning == Some(meaning)
    }
}

impl fmt::Display for EnvelopeAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.profile, self.meaning) {
            (Some(profile), Some(meaning)) => write!(f, "{profile:?}/{meaning:?}"),
            (Some(profile), None) => write!(f, "{profile:?}"),
            (None, Some(meaning)) => write!(f, "{meaning:?}"),
            (None, None) => write!(f, "-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrs() {
        let attrs = EnvelopeAttrs::new(EnvelopeProfile::Braking).with_meaning(PhysicalMeaning::Stop);
        assert!(attrs.has_profile(EnvelopeProfile::Braking));
        assert!(!attrs.has_profile(EnvelopeProfile::Coasting));
        assert!(attrs.has_meaning(PhysicalMeaning::Stop));
        assert_eq!(attrs.to_string(), "Braking/Stop");
        assert_eq!(EnvelopeAttrs::default().to_string(), "-");
    }

    #[test]
    fn test_attrs_serde() {
        let attrs = EnvelopeAttrs::new(EnvelopeProfile::ConstantSpeed)
            .with_meaning(PhysicalMeaning::SpeedLimit);
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"profile":"ConstantSpeed","meaning":"SpeedLimit"}"#);
        let bare: EnvelopeAttrs = serde_json::from_str("{}").unwrap();
        assert_eq!(bare, EnvelopeAttrs::default());
    }
}
