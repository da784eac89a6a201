//! Mapping Rule Table
//!
//! The single place where Redfish properties are tied to metrics. Supporting a
//! new property (or a vendor's alternative spelling of one) means adding a rule
//! or another candidate field here.

use crate::metrics::vocabulary::*;
use crate::metrics::MetricDef;
use crate::redfish::ResourceKind;

/// How a raw JSON value becomes a sample value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    /// JSON number or numeric string
    Number,
    /// `Status.Health`-style enumeration
    Health,
    /// `PowerState` enumeration
    PowerState,
    /// JSON boolean
    Bool,
    /// 1 whenever the field exists
    Presence,
}

/// Where a label value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    /// The target address
    Target,
    /// Path segment after the named collection, e.g. `Parent("Chassis")`
    Parent(&'static str),
    /// The document's `Id`
    ResourceId,
    /// `Name`, then `MemberId`, then array index of an embedded member
    MemberName,
    /// Any field of the member (or document); empty when absent
    Field(&'static str),
}

#[derive(Debug)]
pub struct Rule {
    pub resource: ResourceKind,
    /// Embedded array to iterate; `None` maps the document itself
    pub members: Option<&'static str>,
    /// Candidate field paths, first present wins
    pub fields: &'static [&'static str],
    pub coerce: Coerce,
    pub metric: &'static MetricDef,
    pub labels: &'static [(&'static str, LabelSource)],
}

use Coerce::*;
use LabelSource::*;
use ResourceKind as K;

const SYSTEM: &[(&str, LabelSource)] = &[("target", Target), ("system", ResourceId)];
const PROCESSOR: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("system", Parent("Systems")),
    ("processor", ResourceId),
];
const DIMM: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("system", Parent("Systems")),
    ("dimm", ResourceId),
];
const STORAGE: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("system", Parent("Systems")),
    ("storage", ResourceId),
];
const DRIVE: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("system", Parent("Systems")),
    ("chassis", Parent("Chassis")),
    ("storage", Parent("Storage")),
    ("drive", ResourceId),
];
const CHASSIS: &[(&str, LabelSource)] = &[("target", Target), ("chassis", ResourceId)];
const CHASSIS_MEMBER: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("chassis", Parent("Chassis")),
    ("sensor", MemberName),
];
const SENSOR: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("chassis", Parent("Chassis")),
    ("sensor", ResourceId),
];
const FAN: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("chassis", Parent("Chassis")),
    ("fan", MemberName),
];
const POWER_CONTROL: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("chassis", Parent("Chassis")),
    ("control", MemberName),
];
const PSU: &[(&str, LabelSource)] = &[
    ("target", Target),
    ("chassis", Parent("Chassis")),
    ("psu", MemberName),
];
const MANAGER: &[(&str, LabelSource)] = &[("target", Target), ("manager", ResourceId)];

const fn doc(
    resource: ResourceKind,
    fields: &'static [&'static str],
    coerce: Coerce,
    metric: &'static MetricDef,
    labels: &'static [(&'static str, LabelSource)],
) -> Rule {
    Rule {
        resource,
        members: None,
        fields,
        coerce,
        metric,
        labels,
    }
}

const fn each(
    resource: ResourceKind,
    members: &'static str,
    fields: &'static [&'static str],
    coerce: Coerce,
    metric: &'static MetricDef,
    labels: &'static [(&'static str, LabelSource)],
) -> Rule {
    Rule {
        resource,
        members: Some(members),
        fields,
        coerce,
        metric,
        labels,
    }
}

pub static RULES: &[Rule] = &[
    // ComputerSystem
    doc(
        K::ComputerSystem,
        &["@odata.id"],
        Presence,
        &SYSTEM_INFO,
        &[
            ("target", Target),
            ("system", ResourceId),
            ("manufacturer", Field("Manufacturer")),
            ("model", Field("Model")),
            ("serial_number", Field("SerialNumber")),
            ("bios_version", Field("BiosVersion")),
        ],
    ),
    doc(K::ComputerSystem, &["Status.Health"], Health, &SYSTEM_HEALTH, SYSTEM),
    doc(K::ComputerSystem, &["PowerState"], PowerState, &SYSTEM_POWER_STATE, SYSTEM),
    doc(K::ComputerSystem, &["ProcessorSummary.Count"], Number, &SYSTEM_PROCESSOR_COUNT, SYSTEM),
    doc(
        K::ComputerSystem,
        &["MemorySummary.TotalSystemMemoryGiB"],
        Number,
        &SYSTEM_MEMORY_GIB,
        SYSTEM,
    ),
    // Processor
    doc(K::Processor, &["Status.Health"], Health, &PROCESSOR_HEALTH, PROCESSOR),
    doc(K::Processor, &["TotalCores"], Number, &PROCESSOR_CORES, PROCESSOR),
    doc(K::Processor, &["TotalThreads"], Number, &PROCESSOR_THREADS, PROCESSOR),
    doc(K::Processor, &["MaxSpeedMHz"], Number, &PROCESSOR_MAX_SPEED_MHZ, PROCESSOR),
    // Memory
    doc(K::Memory, &["Status.Health"], Health, &MEMORY_HEALTH, DIMM),
    doc(K::Memory, &["CapacityMiB"], Number, &MEMORY_CAPACITY_MIB, DIMM),
    doc(
        K::Memory,
        &["OperatingSpeedMhz", "OperatingSpeedMHz"],
        Number,
        &MEMORY_SPEED_MHZ,
        DIMM,
    ),
    // Storage
    doc(K::Storage, &["Status.Health"], Health, &STORAGE_HEALTH, STORAGE),
    each(
        K::Storage,
        "StorageControllers",
        &["Status.Health"],
        Health,
        &STORAGE_CONTROLLER_HEALTH,
        &[
            ("target", Target),
            ("system", Parent("Systems")),
            ("storage", ResourceId),
            ("controller", MemberName),
        ],
    ),
    doc(K::Drive, &["Status.Health"], Health, &DRIVE_HEALTH, DRIVE),
    doc(K::Drive, &["CapacityBytes"], Number, &DRIVE_CAPACITY_BYTES, DRIVE),
    doc(K::Drive, &["FailurePredicted"], Bool, &DRIVE_FAILURE_PREDICTED, DRIVE),
    doc(
        K::Drive,
        &["PredictedMediaLifeLeftPercent"],
        Number,
        &DRIVE_LIFE_LEFT_PERCENT,
        DRIVE,
    ),
    // Chassis
    doc(
        K::Chassis,
        &["@odata.id"],
        Presence,
        &CHASSIS_INFO,
        &[
            ("target", Target),
            ("chassis", ResourceId),
            ("chassis_type", Field("ChassisType")),
            ("manufacturer", Field("Manufacturer")),
            ("model", Field("Model")),
            ("serial_number", Field("SerialNumber")),
        ],
    ),
    doc(K::Chassis, &["Status.Health"], Health, &CHASSIS_HEALTH, CHASSIS),
    doc(K::Chassis, &["PowerState"], PowerState, &CHASSIS_POWER_STATE, CHASSIS),
    // Thermal
    each(
        K::Thermal,
        "Temperatures",
        &["ReadingCelsius"],
        Number,
        &TEMPERATURE_CELSIUS,
        CHASSIS_MEMBER,
    ),
    each(
        K::Thermal,
        "Temperatures",
        &["UpperThresholdCritical"],
        Number,
        &TEMPERATURE_UPPER_CRITICAL_CELSIUS,
        CHASSIS_MEMBER,
    ),
    each(
        K::Thermal,
        "Temperatures",
        &["Status.Health"],
        Health,
        &TEMPERATURE_HEALTH,
        CHASSIS_MEMBER,
    ),
    each(
        K::Thermal,
        "Fans",
        &["Reading", "ReadingRPM"],
        Number,
        &FAN_READING,
        &[
            ("target", Target),
            ("chassis", Parent("Chassis")),
            ("fan", MemberName),
            ("unit", Field("ReadingUnits")),
        ],
    ),
    each(K::Thermal, "Fans", &["Status.Health"], Health, &FAN_HEALTH, FAN),
    // Power
    each(
        K::Power,
        "PowerControl",
        &["PowerConsumedWatts"],
        Number,
        &POWER_CONSUMED_WATTS,
        POWER_CONTROL,
    ),
    each(
        K::Power,
        "PowerControl",
        &["PowerCapacityWatts"],
        Number,
        &POWER_CAPACITY_WATTS,
        POWER_CONTROL,
    ),
    each(
        K::Power,
        "PowerControl",
        &["PowerMetrics.AverageConsumedWatts"],
        Number,
        &POWER_AVERAGE_WATTS,
        POWER_CONTROL,
    ),
    each(K::Power, "PowerSupplies", &["Status.Health"], Health, &PSU_HEALTH, PSU),
    each(K::Power, "PowerSupplies", &["PowerInputWatts"], Number, &PSU_INPUT_WATTS, PSU),
    each(
        K::Power,
        "PowerSupplies",
        &["PowerOutputWatts", "LastPowerOutputWatts"],
        Number,
        &PSU_OUTPUT_WATTS,
        PSU,
    ),
    each(
        K::Power,
        "PowerSupplies",
        &["PowerCapacityWatts"],
        Number,
        &PSU_CAPACITY_WATTS,
        PSU,
    ),
    each(K::Power, "Voltages", &["ReadingVolts"], Number, &VOLTAGE_VOLTS, CHASSIS_MEMBER),
    each(K::Power, "Voltages", &["Status.Health"], Health, &VOLTAGE_HEALTH, CHASSIS_MEMBER),
    // Sensors
    doc(
        K::Sensor,
        &["Reading"],
        Number,
        &SENSOR_READING,
        &[
            ("target", Target),
            ("chassis", Parent("Chassis")),
            ("sensor", ResourceId),
            ("reading_type", Field("ReadingType")),
            ("unit", Field("ReadingUnits")),
        ],
    ),
    doc(K::Sensor, &["Status.Health"], Health, &SENSOR_HEALTH, SENSOR),
    doc(
        K::Sensor,
        &["LifetimeReading"],
        Number,
        &SENSOR_LIFETIME_READING,
        &[
            ("target", Target),
            ("chassis", Parent("Chassis")),
            ("sensor", ResourceId),
            ("unit", Field("ReadingUnits")),
        ],
    ),
    // Manager
    doc(
        K::Manager,
        &["@odata.id"],
        Presence,
        &MANAGER_INFO,
        &[
            ("target", Target),
            ("manager", ResourceId),
            ("manager_type", Field("ManagerType")),
            ("model", Field("Model")),
            ("firmware_version", Field("FirmwareVersion")),
        ],
    ),
    doc(K::Manager, &["Status.Health"], Health, &MANAGER_HEALTH, MANAGER),
];

/// Rules that apply to documents of `kind`.
pub fn rules_for(kind: ResourceKind) -> impl Iterator<Item = &'static Rule> {
    RULES.iter().filter(move |rule| rule.resource == kind)
}

/// Whether `metric` carries `Status.Health` codes.
pub fn is_health(metric: &MetricDef) -> bool {
    RULES
        .iter()
        .any(|rule| std::ptr::eq(rule.metric, metric) && rule.coerce == Health)
}
