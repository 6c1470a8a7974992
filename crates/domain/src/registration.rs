//! Registration data model: locally configured registration properties and
//! the identity a producer handed back when we registered with it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Qualified names
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A namespace-qualified property name, written `{namespace}local`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

impl FromStr for QName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, local) = match s.strip_prefix('{') {
            Some(rest) => rest
                .split_once('}')
                .ok_or_else(|| format!("unterminated namespace in '{s}'"))?,
            None => ("", s),
        };
        if local.is_empty() {
            return Err(format!("empty local part in '{s}'"));
        }
        Ok(QName::new(namespace, local))
    }
}

impl TryFrom<String> for QName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QName> for String {
    fn from(name: QName) -> Self {
        name.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Properties
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validation status of a single registration property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    /// Expected by the producer, absent locally.
    Missing,
    /// Adopted from the producer's expectations but still without a value.
    MissingValue,
    /// Changed (or created) locally, not yet checked against the producer.
    Unchecked,
    /// Rejected, or not expected by the producer.
    Invalid,
    /// Accepted by the producer.
    Valid,
}

impl PropertyStatus {
    /// Whether the property blocks registration.
    pub fn is_problem(self) -> bool {
        matches!(
            self,
            PropertyStatus::Missing | PropertyStatus::MissingValue | PropertyStatus::Invalid
        )
    }
}

/// Producer-declared description of an expected registration property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescription {
    pub name: QName,
    #[serde(default = "d_type_name")]
    pub type_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl PropertyDescription {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            type_name: d_type_name(),
            label: None,
            hint: None,
        }
    }
}

fn d_type_name() -> String {
    "xsd:string".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationProperty {
    pub name: QName,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default = "d_lang")]
    pub lang: String,
    pub status: PropertyStatus,
    #[serde(default)]
    pub description: Option<PropertyDescription>,
}

impl RegistrationProperty {
    pub fn new(name: QName, value: Option<String>, status: PropertyStatus) -> Self {
        Self {
            name,
            value,
            lang: d_lang(),
            status,
            description: None,
        }
    }
}

fn d_lang() -> String {
    "en".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registration state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Whether a producer requires registration.
///
/// `Undetermined` means we never asked; `NotRequired` means the producer
/// told us it does not need one. The two are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationRequirement {
    #[default]
    Undetermined,
    NotRequired,
    Required,
}

/// Persisted registration identity plus locally configured properties.
///
/// All mutation goes through methods so the per-property status and the
/// `modified_since_refresh` flag stay in sync with the values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationState {
    consumer_name: String,
    #[serde(default)]
    handle: Option<String>,
    #[serde(default)]
    opaque_state: Option<Vec<u8>>,
    #[serde(default)]
    properties: BTreeMap<QName, RegistrationProperty>,
    #[serde(default)]
    requirement: RegistrationRequirement,
    #[serde(default)]
    modified_since_refresh: bool,
}

impl RegistrationState {
    pub fn new(consumer_name: impl Into<String>) -> Self {
        Self {
            consumer_name: consumer_name.into(),
            handle: None,
            opaque_state: None,
            properties: BTreeMap::new(),
            requirement: RegistrationRequirement::Undetermined,
            modified_since_refresh: false,
        }
    }

    // ── accessors ──────────────────────────────────────────────────

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn opaque_state(&self) -> Option<&[u8]> {
        self.opaque_state.as_deref()
    }

    pub fn requirement(&self) -> RegistrationRequirement {
        self.requirement
    }

    pub fn is_undetermined(&self) -> bool {
        self.requirement == RegistrationRequirement::Undetermined
    }

    pub fn is_registered(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_modified_since_refresh(&self) -> bool {
        self.modified_since_refresh
    }

    /// Whether anything was configured or obtained locally.
    pub fn has_local_info(&self) -> bool {
        self.handle.is_some() || !self.properties.is_empty()
    }

    /// No property currently blocks registration.
    pub fn is_consistent(&self) -> bool {
        self.properties.values().all(|p| !p.status.is_problem())
    }

    pub fn property(&self, name: &QName) -> Option<&RegistrationProperty> {
        self.properties.get(name)
    }

    /// Copy of every property, ordered by name.
    pub fn properties(&self) -> Vec<RegistrationProperty> {
        self.properties.values().cloned().collect()
    }

    pub fn property_names(&self) -> Vec<QName> {
        self.properties.keys().cloned().collect()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    // ── local edits ────────────────────────────────────────────────

    /// Set a property value. A changed (or new) value resets the property to
    /// `Unchecked` and marks the state as modified; re-setting the same value
    /// is a no-op. Returns whether anything changed.
    pub fn set_property_value(&mut self, name: QName, value: Option<String>) -> bool {
        match self.properties.get_mut(&name) {
            Some(prop) if prop.value == value => false,
            Some(prop) => {
                prop.value = value;
                prop.status = PropertyStatus::Unchecked;
                self.modified_since_refresh = true;
                true
            }
            None => {
                self.properties.insert(
                    name.clone(),
                    RegistrationProperty::new(name, value, PropertyStatus::Unchecked),
                );
                self.modified_since_refresh = true;
                true
            }
        }
    }

    pub fn remove_property(&mut self, name: &QName) -> Option<RegistrationProperty> {
        let removed = self.properties.remove(name);
        if removed.is_some() {
            self.modified_since_refresh = true;
        }
        removed
    }

    pub fn set_consumer_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name != self.consumer_name {
            self.consumer_name = name;
            self.modified_since_refresh = true;
        }
    }

    // ── negotiation bookkeeping ────────────────────────────────────

    /// Adopt a producer-expected property that has no local counterpart.
    pub fn adopt_missing(&mut self, description: PropertyDescription) -> RegistrationProperty {
        let mut prop = RegistrationProperty::new(
            description.name.clone(),
            None,
            PropertyStatus::MissingValue,
        );
        prop.description = Some(description);
        self.properties.insert(prop.name.clone(), prop.clone());
        prop
    }

    pub fn set_status(&mut self, name: &QName, status: PropertyStatus) {
        if let Some(prop) = self.properties.get_mut(name) {
            prop.status = status;
        }
    }

    pub fn set_description(&mut self, description: PropertyDescription) {
        if let Some(prop) = self.properties.get_mut(&description.name) {
            prop.description = Some(description);
        }
    }

    pub fn set_requirement(&mut self, requirement: RegistrationRequirement) {
        self.requirement = requirement;
    }

    pub fn clear_modified(&mut self) {
        self.modified_since_refresh = false;
    }

    /// Record a successful register / modify-registration handshake.
    pub fn mark_registered(&mut self, handle: String, opaque_state: Option<Vec<u8>>) {
        self.handle = Some(handle);
        self.opaque_state = opaque_state;
        self.requirement = RegistrationRequirement::Required;
        self.modified_since_refresh = false;
        for prop in self.properties.values_mut() {
            prop.status = PropertyStatus::Valid;
        }
    }

    /// Forget the handle the producer no longer accepts, keeping properties.
    pub fn clear_handle(&mut self) {
        if self.handle.take().is_some() {
            self.opaque_state = None;
            self.modified_since_refresh = true;
        }
    }

    /// Back to the undetermined sentinel. Properties survive but must be
    /// checked again.
    pub fn erase(&mut self) {
        self.handle = None;
        self.opaque_state = None;
        self.requirement = RegistrationRequirement::Undetermined;
        self.modified_since_refresh = false;
        for prop in self.properties.values_mut() {
            prop.status = PropertyStatus::Unchecked;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn qn(local: &str) -> QName {
        QName::new("urn:test", local)
    }

    #[test]
    fn qname_parses_and_displays() {
        let name: QName = "{urn:test}email".parse().unwrap();
        assert_eq!(name, qn("email"));
        assert_eq!(name.to_string(), "{urn:test}email");

        let bare: QName = "email".parse().unwrap();
        assert_eq!(bare.namespace, "");
        assert_eq!(bare.to_string(), "email");
    }

    #[test]
    fn qname_rejects_malformed() {
        assert!("{urn:test".parse::<QName>().is_err());
        assert!("{urn:test}".parse::<QName>().is_err());
        assert!("".parse::<QName>().is_err());
    }

    #[test]
    fn new_state_is_undetermined() {
        let state = RegistrationState::new("consumer");
        assert!(state.is_undetermined());
        assert!(!state.is_registered());
        assert!(!state.is_modified_since_refresh());
        assert!(!state.has_local_info());
    }

    #[test]
    fn changing_value_resets_status_and_marks_modified() {
        let mut state = RegistrationState::new("consumer");
        state.set_property_value(qn("email"), Some("a@b.c".into()));
        state.mark_registered("h1".into(), None);
        assert_eq!(state.property(&qn("email")).unwrap().status, PropertyStatus::Valid);
        assert!(!state.is_modified_since_refresh());

        assert!(state.set_property_value(qn("email"), Some("x@y.z".into())));
        let prop = state.property(&qn("email")).unwrap();
        assert_eq!(prop.status, PropertyStatus::Unchecked);
        assert!(state.is_modified_since_refresh());
    }

    #[test]
    fn same_value_is_noop() {
        let mut state = RegistrationState::new("consumer");
        state.set_property_value(qn("email"), Some("a@b.c".into()));
        state.clear_modified();
        assert!(!state.set_property_value(qn("email"), Some("a@b.c".into())));
        assert!(!state.is_modified_since_refresh());
    }

    #[test]
    fn erase_resets_to_undetermined() {
        let mut state = RegistrationState::new("consumer");
        state.set_property_value(qn("email"), Some("a@b.c".into()));
        state.mark_registered("h1".into(), Some(vec![1, 2, 3]));
        state.erase();

        assert!(state.is_undetermined());
        assert_eq!(state.handle(), None);
        assert_eq!(state.opaque_state(), None);
        assert_eq!(state.property(&qn("email")).unwrap().status, PropertyStatus::Unchecked);
    }

    #[test]
    fn serde_round_trip_keeps_qualified_keys() {
        let mut state = RegistrationState::new("consumer");
        state.set_property_value(qn("email"), Some("a@b.c".into()));
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("{urn:test}email"));
        let back: RegistrationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
