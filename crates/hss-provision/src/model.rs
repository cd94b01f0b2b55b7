//! Subscriber profile types.
//!
//! The wire names follow the subscriber documents of the home network
//! database (`snake_case`, `type` for the PDU session type, integer codes for
//! barring and status).

use crate::identity::{Imsi, Msisdn, SubscriberId};
use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Administrative lifecycle of a subscriber.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl fmt::Display for SubscriberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        })
    }
}

/// PDU session type, encoded as `0`, `1` or `2` on the wire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SessionType {
    Ipv4,
    Ipv6,
    #[default]
    Ipv4v6,
}

impl TryFrom<u8> for SessionType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ipv4),
            1 => Ok(Self::Ipv6),
            2 => Ok(Self::Ipv4v6),
            other => Err(format!("session type must be 0, 1 or 2 (got {other})")),
        }
    }
}

impl From<SessionType> for u8 {
    fn from(value: SessionType) -> Self {
        match value {
            SessionType::Ipv4 => 0,
            SessionType::Ipv6 => 1,
            SessionType::Ipv4v6 => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitrateUnit {
    #[serde(rename = "bps")]
    Bps,
    #[serde(rename = "Kbps")]
    Kbps,
    #[serde(rename = "Mbps")]
    Mbps,
    #[serde(rename = "Gbps")]
    Gbps,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Bitrate {
    #[validate(range(exclusive_min = 0.0, message = "must be a positive number"))]
    pub value: f64,
    pub unit: BitrateUnit,
}

/// Aggregate maximum bit rate of a session.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Ambr {
    #[validate(nested)]
    pub uplink: Bitrate,
    #[validate(nested)]
    pub downlink: Bitrate,
}

/// Allocation and retention priority.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Arp {
    #[validate(range(min = 1, max = 15, message = "must be between 1 and 15"))]
    pub priority_level: u8,
    #[validate(range(min = 0, max = 1, message = "must be 0 or 1"))]
    pub pre_emption_capability: u8,
    #[validate(range(min = 0, max = 1, message = "must be 0 or 1"))]
    pub pre_emption_vulnerability: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Qos {
    /// 5QI.
    #[validate(range(min = 1, max = 15, message = "must be between 1 and 15"))]
    pub index: u8,
    #[validate(nested)]
    pub arp: Arp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Session {
    /// DNN / APN.
    #[validate(custom(function = "crate::validate::not_blank"))]
    pub name: String,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    #[validate(nested)]
    pub ambr: Ambr,
    #[validate(nested)]
    pub qos: Qos,
}

/// S-NSSAI bound to a subscriber with its sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Slice {
    #[validate(range(min = 1, max = 4, message = "must be between 1 and 4"))]
    pub sst: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(equal = 6, message = "must be exactly 6 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub sd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_indicator: Option<bool>,
    #[serde(default)]
    #[validate(nested)]
    pub session: Vec<Session>,
}

fn default_roaming_allowed() -> bool {
    true
}

/// Profile fields applied identically to every subscriber of a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct SubscriberTemplate {
    #[validate(
        length(equal = 32, message = "must be exactly 32 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub k: String,
    #[validate(
        length(equal = 32, message = "must be exactly 32 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub opc: String,
    #[validate(
        length(equal = 4, message = "must be exactly 4 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub amf: String,
    #[validate(
        length(equal = 12, message = "must be exactly 12 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub sqn: String,
    #[serde(default)]
    #[validate(nested)]
    pub slice: Vec<Slice>,
    #[serde(default)]
    pub status: SubscriberStatus,
    #[serde(default)]
    pub subscriber_status: i32,
    #[serde(default)]
    pub operator_determined_barring: i32,
    #[serde(default = "default_roaming_allowed")]
    pub roaming_allowed: bool,
}

impl SubscriberTemplate {
    /// Uppercases every hex field in place.
    pub fn normalize(&mut self) {
        for field in [&mut self.k, &mut self.opc, &mut self.amf, &mut self.sqn] {
            field.make_ascii_uppercase();
        }
        for sd in self.slice.iter_mut().filter_map(|s| s.sd.as_mut()) {
            sd.make_ascii_uppercase();
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// A subscriber that has not been assigned an id yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewSubscriber {
    pub imsi: Imsi,
    pub msisdn: Option<Msisdn>,
    pub profile: SubscriberTemplate,
    pub created_at: DateTime<Utc>,
}

impl NewSubscriber {
    pub fn new(imsi: Imsi, msisdn: Option<Msisdn>, profile: SubscriberTemplate) -> Self {
        Self {
            imsi,
            msisdn,
            profile,
            created_at: Utc::now(),
        }
    }

    /// Finalizes the record with the id the store assigned.
    pub fn into_subscriber(self, id: SubscriberId) -> Subscriber {
        Subscriber {
            id,
            imsi: self.imsi,
            msisdn: self.msisdn,
            profile: self.profile,
            created_at: self.created_at,
            updated_at: self.created_at,
            last_seen: None,
        }
    }
}

/// A persisted subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub imsi: Imsi,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msisdn: Option<Msisdn>,
    #[serde(flatten)]
    pub profile: SubscriberTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Partial update of a subscriber. `None` leaves a field untouched; the IMSI
/// cannot be changed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SubscriberPatch {
    pub msisdn: Option<Msisdn>,
    #[validate(
        length(equal = 32, message = "must be exactly 32 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub k: Option<String>,
    #[validate(
        length(equal = 32, message = "must be exactly 32 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub opc: Option<String>,
    #[validate(
        length(equal = 4, message = "must be exactly 4 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub amf: Option<String>,
    #[validate(
        length(equal = 12, message = "must be exactly 12 hexadecimal characters"),
        custom(function = "crate::validate::hex")
    )]
    pub sqn: Option<String>,
    #[validate(nested)]
    pub slice: Option<Vec<Slice>>,
    pub status: Option<SubscriberStatus>,
    pub subscriber_status: Option<i32>,
    pub operator_determined_barring: Option<i32>,
    pub roaming_allowed: Option<bool>,
}

impl SubscriberPatch {
    /// Applies every present field to `subscriber` and re-normalizes its hex
    /// fields. Does not touch `updated_at`.
    pub fn apply(self, subscriber: &mut Subscriber) {
        let profile = &mut subscriber.profile;
        if let Some(msisdn) = self.msisdn {
            subscriber.msisdn = Some(msisdn);
        }
        if let Some(k) = self.k {
            profile.k = k;
        }
        if let Some(opc) = self.opc {
            profile.opc = opc;
        }
        if let Some(amf) = self.amf {
            profile.amf = amf;
        }
        if let Some(sqn) = self.sqn {
            profile.sqn = sqn;
        }
        if let Some(slice) = self.slice {
            profile.slice = slice;
        }
        if let Some(status) = self.status {
            profile.status = status;
        }
        if let Some(code) = self.subscriber_status {
            profile.subscriber_status = code;
        }
        if let Some(code) = self.operator_determined_barring {
            profile.operator_determined_barring = code;
        }
        if let Some(allowed) = self.roaming_allowed {
            profile.roaming_allowed = allowed;
        }
        profile.normalize();
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn normalize_uppercases_hex_fields() {
        let t = template().normalized();
        assert_eq!(t.k, "465B5CE8B199B49FAA5F0A2EE238A6BC");
        assert_eq!(t.opc, "E8ED289DEBA952E4283B54E88E6183CA");
        assert_eq!(t.slice[0].sd.as_deref(), Some("0000FF"));
    }

    #[test]
    fn subscriber_json_is_flat() {
        let imsi: Imsi = "001010000000001".parse().unwrap();
        let sub = NewSubscriber::new(imsi, None, template())
            .into_subscriber(SubscriberId::new("65f1c0de0000000000000001"));
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["imsi"], "001010000000001");
        assert_eq!(json["amf"], "8000");
        assert_eq!(json["status"], "active");
        assert_eq!(json["slice"][0]["session"][0]["type"], 2);
        assert_eq!(json["slice"][0]["session"][0]["ambr"]["uplink"]["unit"], "Gbps");
        assert!(json.get("msisdn").is_none());
        assert!(json.get("last_seen").is_none());

        let back: Subscriber = serde_json::from_value(json).unwrap();
        assert_eq!(back, sub);
    }

    #[test]
    fn template_defaults() {
        let t: SubscriberTemplate = serde_json::from_value(serde_json::json!({
            "k": "00", "opc": "00", "amf": "8000", "sqn": "000000000000"
        }))
        .unwrap();
        assert!(t.slice.is_empty());
        assert_eq!(t.status, SubscriberStatus::Active);
        assert!(t.roaming_allowed);
    }

    #[test]
    fn session_type_rejects_unknown_code() {
        assert!(serde_json::from_str::<SessionType>("3").is_err());
        assert_eq!(serde_json::from_str::<SessionType>("1").unwrap(), SessionType::Ipv6);
    }

    #[test]
    fn patch_keeps_untouched_fields() {
        let imsi: Imsi = "001010000000001".parse().unwrap();
        let mut sub = NewSubscriber::new(imsi, None, template().normalized())
            .into_subscriber(SubscriberId::new("a"));
        SubscriberPatch {
            sqn: Some("00000000000a".to_string()),
            status: Some(SubscriberStatus::Suspended),
            ..Default::default()
        }
        .apply(&mut sub);
        assert_eq!(sub.profile.sqn, "00000000000A");
        assert_eq!(sub.profile.status, SubscriberStatus::Suspended);
        assert_eq!(sub.profile.amf, "8000");
        assert_eq!(sub.profile.slice.len(), 1);
    }
}
