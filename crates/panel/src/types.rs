use std::collections::{BTreeMap, btree_map};

use serde::{
    Deserialize, Serialize, Serializer,
    ser::{SerializeMap, SerializeTuple},
};

/// One account as listed by the panel.
///
/// Extra fields sent by the panel (speed limits, device limits) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PanelUser {
    /// Account credential presented by clients in place of a password.
    pub uuid: String,
    pub id: u32,
}

/// Body of `GET /api/v1/server/UniProxy/user`.
///
/// `users` is required: a body without it is a schema mismatch, not an empty list.
#[derive(Debug, Clone, Deserialize)]
pub struct UserList {
    pub users: Vec<PanelUser>,
}

/// Download/upload byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traffic {
    pub download: u64,
    pub upload: u64,
}

impl Traffic {
    #[must_use]
    pub const fn new(download: u64, upload: u64) -> Self {
        Self { download, upload }
    }

    /// Add another sample. Counters saturate rather than wrap.
    pub fn add(&mut self, other: Traffic) {
        self.download = self.download.saturating_add(other.download);
        self.upload = self.upload.saturating_add(other.upload);
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.download == 0 && self.upload == 0
    }
}

/// Body of `POST /api/v1/server/UniProxy/push`.
///
/// Serializes as `{"<id>": ["<download>", "<upload>"], ...}`: keys are the
/// decimal account id and both counters are decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficReport {
    entries: BTreeMap<u32, Traffic>,
}

impl TrafficReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage for an account, summing with any usage already present for it.
    pub fn add(&mut self, account_id: u32, traffic: Traffic) {
        self.entries.entry(account_id).or_default().add(traffic);
    }

    #[must_use]
    pub fn get(&self, account_id: u32) -> Option<Traffic> {
        self.entries.get(&account_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counters in the report.
    #[must_use]
    pub fn total(&self) -> Traffic {
        self.entries.values().fold(Traffic::default(), |mut acc, t| {
            acc.add(*t);
            acc
        })
    }

    pub fn iter(&self) -> btree_map::Iter<'_, u32, Traffic> {
        self.entries.iter()
    }
}

impl FromIterator<(u32, Traffic)> for TrafficReport {
    fn from_iter<I: IntoIterator<Item = (u32, Traffic)>>(iter: I) -> Self {
        let mut report = Self::new();
        for (id, traffic) in iter {
            report.add(id, traffic);
        }
        report
    }
}

struct Counters(Traffic);

impl Serialize for Counters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&self.0.download.to_string())?;
        pair.serialize_element(&self.0.upload.to_string())?;
        pair.end()
    }
}

impl Serialize for TrafficReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, traffic) in &self.entries {
            map.serialize_entry(&id.to_string(), &Counters(*traffic))?;
        }
        map.end()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn report_serializes_counters_as_strings() {
        let report: TrafficReport = [(7, Traffic::new(100, 50)), (12, Traffic::new(0, 1))]
            .into_iter()
            .collect();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, json!({"7": ["100", "50"], "12": ["0", "1"]}));
    }

    #[test]
    fn large_counters_keep_full_precision() {
        let report: TrafficReport = [(1, Traffic::new(u64::MAX, 9_007_199_254_740_993))]
            .into_iter()
            .collect();
        let body = serde_json::to_string(&report).unwrap();
        assert_eq!(
            body,
            r#"{"1":["18446744073709551615","9007199254740993"]}"#
        );
    }

    #[test]
    fn duplicate_account_ids_are_summed() {
        let mut report = TrafficReport::new();
        report.add(3, Traffic::new(10, 1));
        report.add(3, Traffic::new(5, 2));
        assert_eq!(report.len(), 1);
        assert_eq!(report.get(3), Some(Traffic::new(15, 3)));
    }

    #[test]
    fn traffic_add_saturates() {
        let mut t = Traffic::new(u64::MAX - 1, 0);
        t.add(Traffic::new(5, 5));
        assert_eq!(t, Traffic::new(u64::MAX, 5));
    }

    #[test]
    fn user_list_requires_users_field() {
        assert!(serde_json::from_str::<UserList>(r#"{"data": []}"#).is_err());
        assert!(serde_json::from_str::<UserList>(r#"{"users": null}"#).is_err());
    }

    #[test]
    fn user_list_rejects_out_of_range_ids() {
        let body = r#"{"users": [{"uuid": "a", "id": 1}, {"uuid": "b", "id": 4294967296}]}"#;
        assert!(serde_json::from_str::<UserList>(body).is_err());
        let body = r#"{"users": [{"uuid": "a", "id": -1}]}"#;
        assert!(serde_json::from_str::<UserList>(body).is_err());
    }

    #[test]
    fn user_list_ignores_extra_fields() {
        let body = r#"{"users": [{"uuid": "abc", "id": 7, "speed_limit": null}]}"#;
        let list: UserList = serde_json::from_str(body).unwrap();
        assert_eq!(list.users, vec![PanelUser {
            uuid: "abc".into(),
            id: 7
        }]);
    }
}
