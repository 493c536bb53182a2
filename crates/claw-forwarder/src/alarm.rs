//! Alarm model consumed by the forwarding engine.
//!
//! Alarms are read-only to the engine. The JSON form uses camelCase field
//! names so alarm exports can be fed to the binary directly.

use std::fmt;

use chrono::{DateTime, Utc};
use claw_filter::{EvalContext, Value};
use claw_incident::IncidentSeverity;
use serde::{Deserialize, Serialize};

/// Alarm severity on the 1 to 7 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Severity could not be determined.
    #[default]
    Indeterminate,
    /// The condition has cleared.
    Cleared,
    /// Informational.
    Normal,
    /// Warning.
    Warning,
    /// Minor problem.
    Minor,
    /// Major problem.
    Major,
    /// Critical problem.
    Critical,
}

impl Severity {
    /// Returns the numeric level, from 1 (indeterminate) to 7 (critical).
    #[must_use]
    pub const fn level(&self) -> u32 {
        match self {
            Self::Indeterminate => 1,
            Self::Cleared => 2,
            Self::Normal => 3,
            Self::Warning => 4,
            Self::Minor => 5,
            Self::Major => 6,
            Self::Critical => 7,
        }
    }

    /// Returns the upper-case label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Indeterminate => "INDETERMINATE",
            Self::Cleared => "CLEARED",
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Maps the alarm severity onto the incident severity scale.
    #[must_use]
    pub const fn incident_severity(&self) -> IncidentSeverity {
        match self {
            Self::Critical => IncidentSeverity::Critical,
            Self::Major => IncidentSeverity::Error,
            Self::Minor | Self::Warning => IncidentSeverity::Warning,
            Self::Normal | Self::Cleared | Self::Indeterminate => IncidentSeverity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmType {
    /// Raised by a problem.
    Problem,
    /// Raised by the resolution of a problem.
    Resolution,
    /// Stateless notification.
    Notification,
}

impl AlarmType {
    /// Returns the upper-case label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Problem => "PROBLEM",
            Self::Resolution => "RESOLUTION",
            Self::Notification => "NOTIFICATION",
        }
    }
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An IP interface of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpInterface {
    /// Address of the interface.
    pub ip_address: String,
}

/// The node an alarm was raised on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node label.
    #[serde(default)]
    pub label: Option<String>,
    /// Monitoring location.
    #[serde(default)]
    pub location: Option<String>,
    /// Surveillance categories.
    #[serde(default)]
    pub categories: Vec<String>,
    /// IP interfaces, primary first.
    #[serde(default)]
    pub ip_interfaces: Vec<IpInterface>,
}

impl Node {
    /// Creates a node with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Adds a category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Adds an IP interface.
    #[must_use]
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_interfaces.push(IpInterface {
            ip_address: ip_address.into(),
        });
        self
    }

    /// Returns the address of the first interface, if any.
    #[must_use]
    pub fn primary_ip_address(&self) -> Option<&str> {
        self.ip_interfaces.first().map(|i| i.ip_address.as_str())
    }
}

/// A name/value parameter of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: String,
}

impl EventParameter {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The most recent event that touched an alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseEvent {
    /// Event UEI.
    pub uei: String,
    /// When the event occurred.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    /// Event parameters in arrival order.
    #[serde(default)]
    pub parameters: Vec<EventParameter>,
}

impl DatabaseEvent {
    /// Creates an event with the given UEI.
    #[must_use]
    pub fn new(uei: impl Into<String>) -> Self {
        Self {
            uei: uei.into(),
            time: None,
            parameters: Vec::new(),
        }
    }

    /// Sets the event time.
    #[must_use]
    pub const fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(EventParameter::new(name, value));
        self
    }

    /// Returns the value of the first parameter with the given name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// A deduplicated fault record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    /// Numeric alarm id.
    pub id: i64,
    /// Correlation key shared by all occurrences of the same fault.
    pub reduction_key: String,
    /// Current severity.
    #[serde(default)]
    pub severity: Severity,
    /// Whether an operator acknowledged the alarm.
    #[serde(default)]
    pub acknowledged: bool,
    /// Alarm type, if known.
    #[serde(default, rename = "type")]
    pub alarm_type: Option<AlarmType>,
    /// Human-readable description.
    #[serde(default)]
    pub log_message: String,
    /// Node the alarm was raised on.
    #[serde(default)]
    pub node: Option<Node>,
    /// Type of the managed object the alarm refers to.
    #[serde(default)]
    pub managed_object_type: Option<String>,
    /// Instance of the managed object the alarm refers to.
    #[serde(default)]
    pub managed_object_instance: Option<String>,
    /// Most recent event for the alarm.
    #[serde(default)]
    pub last_event: Option<DatabaseEvent>,
}

impl Alarm {
    /// Creates a problem alarm with the given identity and defaults elsewhere.
    #[must_use]
    pub fn new(id: i64, reduction_key: impl Into<String>) -> Self {
        Self {
            id,
            reduction_key: reduction_key.into(),
            severity: Severity::Indeterminate,
            acknowledged: false,
            alarm_type: Some(AlarmType::Problem),
            log_message: String::new(),
            node: None,
            managed_object_type: None,
            managed_object_instance: None,
            last_event: None,
        }
    }

    /// Sets the severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the acknowledged flag.
    #[must_use]
    pub const fn with_acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = acknowledged;
        self
    }

    /// Sets the alarm type.
    #[must_use]
    pub const fn with_type(mut self, alarm_type: AlarmType) -> Self {
        self.alarm_type = Some(alarm_type);
        self
    }

    /// Sets the log message.
    #[must_use]
    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = message.into();
        self
    }

    /// Sets the node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.node = Some(node);
        self
    }

    /// Sets the managed object type and instance.
    #[must_use]
    pub fn with_managed_object(
        mut self,
        object_type: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        self.managed_object_type = Some(object_type.into());
        self.managed_object_instance = Some(instance.into());
        self
    }

    /// Sets the last event.
    #[must_use]
    pub fn with_last_event(mut self, event: DatabaseEvent) -> Self {
        self.last_event = Some(event);
        self
    }

    /// Returns the node label, if the alarm has a labelled node.
    #[must_use]
    pub fn node_label(&self) -> Option<&str> {
        self.node.as_ref().and_then(|n| n.label.as_deref())
    }
}

/// Exposes alarm fields to filter expressions under the `alarm.` root.
///
/// Paths use the camelCase names of the JSON form, e.g. `alarm.reductionKey`
/// or `alarm.node.label`. `alarm.severity` is the upper-case label and
/// `alarm.severityLevel` the numeric level. Event parameters are reachable
/// as `alarm.lastEvent.parameters.<name>`.
impl EvalContext for Alarm {
    fn resolve(&self, path: &[&str]) -> Option<Value> {
        let ["alarm", rest @ ..] = path else {
            return None;
        };

        let value = match rest {
            ["id"] => Value::from(self.id),
            ["reductionKey"] => Value::from(self.reduction_key.as_str()),
            ["severity"] => Value::from(self.severity.as_str()),
            ["severityLevel"] => Value::from(self.severity.level()),
            ["acknowledged"] => Value::from(self.acknowledged),
            ["type"] => Value::from(self.alarm_type.map(|t| t.as_str())),
            ["logMessage"] => Value::from(self.log_message.as_str()),
            ["managedObjectType"] => Value::from(self.managed_object_type.clone()),
            ["managedObjectInstance"] => Value::from(self.managed_object_instance.clone()),
            ["node", field] => {
                let node = self.node.as_ref();
                match *field {
                    "label" => Value::from(node.and_then(|n| n.label.clone())),
                    "location" => Value::from(node.and_then(|n| n.location.clone())),
                    "categories" => Value::from(node.map(|n| n.categories.clone())),
                    "ipAddress" => {
                        Value::from(node.and_then(|n| n.primary_ip_address().map(str::to_string)))
                    }
                    _ => return None,
                }
            }
            ["lastEvent", "uei"] => {
                Value::from(self.last_event.as_ref().map(|e| e.uei.clone()))
            }
            ["lastEvent", "parameters", name] => Value::from(
                self.last_event
                    .as_ref()
                    .and_then(|e| e.parameter(name))
                    .map(str::to_string),
            ),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use claw_filter::{Expression, Predicate};
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    fn sample_alarm() -> Alarm {
        Alarm::new(17, "uei.opennms.org/nodes/nodeDown::12")
            .with_severity(Severity::Major)
            .with_log_message("Node router-1 is down.")
            .with_node(
                Node::new("router-1")
                    .with_location("Default")
                    .with_category("Routers")
                    .with_ip_address("10.0.0.1"),
            )
            .with_last_event(
                DatabaseEvent::new("uei.opennms.org/nodes/nodeDown")
                    .with_parameter("reason", "ICMP timeout"),
            )
    }

    mod severity_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(Severity::Critical, IncidentSeverity::Critical; "critical")]
        #[test_case(Severity::Major, IncidentSeverity::Error; "major")]
        #[test_case(Severity::Minor, IncidentSeverity::Warning; "minor")]
        #[test_case(Severity::Warning, IncidentSeverity::Warning; "warning")]
        #[test_case(Severity::Normal, IncidentSeverity::Info; "normal")]
        #[test_case(Severity::Cleared, IncidentSeverity::Info; "cleared")]
        #[test_case(Severity::Indeterminate, IncidentSeverity::Info; "indeterminate")]
        fn maps_to_incident_severity(severity: Severity, expected: IncidentSeverity) {
            assert_eq!(severity.incident_severity(), expected);
        }

        #[test]
        fn levels_follow_declaration_order() {
            assert_eq!(Severity::Indeterminate.level(), 1);
            assert_eq!(Severity::Critical.level(), 7);
            assert!(Severity::Major > Severity::Minor);
        }

        #[test]
        fn serializes_as_upper_case_label() {
            let json = serde_json::to_string(&Severity::Major).unwrap();
            assert_eq!(json, "\"MAJOR\"");
            assert_eq!(Severity::Major.to_string(), "MAJOR");
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn deserializes_camel_case_alarm() {
            let json = r#"{
                "id": 3,
                "reductionKey": "uei.opennms.org/nodes/nodeDown::3",
                "severity": "CRITICAL",
                "type": "PROBLEM",
                "logMessage": "down",
                "node": {
                    "label": "sw-1",
                    "categories": ["Switches"],
                    "ipInterfaces": [{"ipAddress": "192.168.1.2"}]
                },
                "lastEvent": {
                    "uei": "uei.opennms.org/nodes/nodeDown",
                    "time": "2024-05-01T12:00:00Z",
                    "parameters": [{"name": "a", "value": "1"}]
                }
            }"#;
            let alarm: Alarm = serde_json::from_str(json).unwrap();
            assert_eq!(alarm.id, 3);
            assert_eq!(alarm.severity, Severity::Critical);
            assert_eq!(alarm.alarm_type, Some(AlarmType::Problem));
            assert_eq!(alarm.node_label(), Some("sw-1"));
            assert_eq!(
                alarm.node.as_ref().and_then(Node::primary_ip_address),
                Some("192.168.1.2")
            );
            assert!(alarm.last_event.unwrap().time.is_some());
        }

        #[test]
        fn minimal_alarm_uses_defaults() {
            let alarm: Alarm =
                serde_json::from_str(r#"{"id": 1, "reductionKey": "k"}"#).unwrap();
            assert_eq!(alarm.severity, Severity::Indeterminate);
            assert!(!alarm.acknowledged);
            assert!(alarm.alarm_type.is_none());
            assert!(alarm.node.is_none());
        }
    }

    mod context_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(&["alarm", "id"], Value::from(17); "id")]
        #[test_case(&["alarm", "reductionKey"], Value::from("uei.opennms.org/nodes/nodeDown::12"); "reduction key")]
        #[test_case(&["alarm", "severity"], Value::from("MAJOR"); "severity label")]
        #[test_case(&["alarm", "severityLevel"], Value::from(6); "severity level")]
        #[test_case(&["alarm", "acknowledged"], Value::from(false); "acknowledged")]
        #[test_case(&["alarm", "type"], Value::from("PROBLEM"); "type")]
        #[test_case(&["alarm", "node", "label"], Value::from("router-1"); "node label")]
        #[test_case(&["alarm", "node", "location"], Value::from("Default"); "node location")]
        #[test_case(&["alarm", "node", "categories"], Value::from(vec!["Routers"]); "node categories")]
        #[test_case(&["alarm", "node", "ipAddress"], Value::from("10.0.0.1"); "node ip")]
        #[test_case(&["alarm", "managedObjectType"], Value::Null; "absent managed object")]
        #[test_case(&["alarm", "lastEvent", "uei"], Value::from("uei.opennms.org/nodes/nodeDown"); "last event uei")]
        #[test_case(&["alarm", "lastEvent", "parameters", "reason"], Value::from("ICMP timeout"); "event parameter")]
        #[test_case(&["alarm", "lastEvent", "parameters", "missing"], Value::Null; "missing parameter")]
        fn resolves_known_paths(path: &[&str], expected: Value) {
            assert_eq!(sample_alarm().resolve(path), Some(expected));
        }

        #[test_case(&["node", "label"]; "missing root")]
        #[test_case(&["alarm", "nope"]; "unknown field")]
        #[test_case(&["alarm", "node", "nope"]; "unknown node field")]
        #[test_case(&["alarm"]; "bare root")]
        fn unknown_paths_resolve_to_none(path: &[&str]) {
            assert_eq!(sample_alarm().resolve(path), None);
        }

        #[test]
        fn node_fields_are_null_without_node() {
            let alarm = Alarm::new(1, "k");
            assert_eq!(alarm.resolve(&["alarm", "node", "label"]), Some(Value::Null));
            assert_eq!(alarm.resolve(&["alarm", "node", "categories"]), Some(Value::Null));
        }

        #[test]
        fn filter_expression_against_alarm() {
            let filter = Expression::compile(
                "alarm.severityLevel >= 6 && alarm.node.categories =~ 'Rout.*' && !alarm.acknowledged",
            )
            .unwrap();
            assert!(filter.test(&sample_alarm()).unwrap());
            assert!(!filter.test(&sample_alarm().with_acknowledged(true)).unwrap());
        }
    }

    proptest! {
        #[test]
        fn severity_mapping_is_total_and_monotonic(a in 0usize..7, b in 0usize..7) {
            const ALL: [Severity; 7] = [
                Severity::Indeterminate,
                Severity::Cleared,
                Severity::Normal,
                Severity::Warning,
                Severity::Minor,
                Severity::Major,
                Severity::Critical,
            ];
            let (sa, sb) = (ALL[a], ALL[b]);
            if sa <= sb {
                prop_assert!(sa.incident_severity() <= sb.incident_severity());
            }
        }
    }
}
