//! Metric Vocabulary
//!
//! Every metric the exporter can emit, with its fixed label names. All
//! device metrics carry `target` first.
//!
//! # Value Encodings
//!
//! - `*_health`: OK=0, Warning=1, Critical=2, unrecognized=-1
//! - `*_power_state`: Off=0, On=1, PoweringOn=2, PoweringOff=3, Paused=4, unrecognized=-1
//! - `*_info`: always 1, descriptive fields as labels
//! - `redfish_scrape_status`: see [`crate::collector::TargetStatus::code`]

use super::{MetricDef, MetricKind};

const fn gauge(
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
) -> MetricDef {
    MetricDef {
        name,
        help,
        kind: MetricKind::Gauge,
        labels,
    }
}

const fn counter(
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
) -> MetricDef {
    MetricDef {
        name,
        help,
        kind: MetricKind::Counter,
        labels,
    }
}

// Per-target poll outcome
pub static UP: MetricDef = gauge(
    "redfish_up",
    "Whether the last poll of the target produced data (1) or not (0)",
    &["target"],
);
pub static SCRAPE_STATUS: MetricDef = gauge(
    "redfish_scrape_status",
    "Poll outcome (0=success, 1=partial, 2=auth failure, 3=unreachable, 4=timeout)",
    &["target"],
);
pub static SCRAPE_DURATION_SECONDS: MetricDef = gauge(
    "redfish_scrape_duration_seconds",
    "Time spent polling the target",
    &["target"],
);
pub static SCRAPE_RESOURCES_SKIPPED: MetricDef = gauge(
    "redfish_scrape_resources_skipped",
    "Resources that could not be fetched during the poll",
    &["target"],
);

// Systems
pub static SYSTEM_INFO: MetricDef = gauge(
    "redfish_system_info",
    "Computer system information",
    &["target", "system", "manufacturer", "model", "serial_number", "bios_version"],
);
pub static SYSTEM_HEALTH: MetricDef = gauge(
    "redfish_system_health",
    "Computer system health",
    &["target", "system"],
);
pub static SYSTEM_POWER_STATE: MetricDef = gauge(
    "redfish_system_power_state",
    "Computer system power state",
    &["target", "system"],
);
pub static SYSTEM_PROCESSOR_COUNT: MetricDef = gauge(
    "redfish_system_processor_count",
    "Number of processors reported in the system summary",
    &["target", "system"],
);
pub static SYSTEM_MEMORY_GIB: MetricDef = gauge(
    "redfish_system_memory_gib",
    "Total system memory in GiB",
    &["target", "system"],
);

// Processors
pub static PROCESSOR_HEALTH: MetricDef = gauge(
    "redfish_processor_health",
    "Processor health",
    &["target", "system", "processor"],
);
pub static PROCESSOR_CORES: MetricDef = gauge(
    "redfish_processor_cores",
    "Processor core count",
    &["target", "system", "processor"],
);
pub static PROCESSOR_THREADS: MetricDef = gauge(
    "redfish_processor_threads",
    "Processor thread count",
    &["target", "system", "processor"],
);
pub static PROCESSOR_MAX_SPEED_MHZ: MetricDef = gauge(
    "redfish_processor_max_speed_mhz",
    "Processor maximum speed in MHz",
    &["target", "system", "processor"],
);

// Memory
pub static MEMORY_HEALTH: MetricDef = gauge(
    "redfish_memory_health",
    "Memory module health",
    &["target", "system", "dimm"],
);
pub static MEMORY_CAPACITY_MIB: MetricDef = gauge(
    "redfish_memory_capacity_mib",
    "Memory module capacity in MiB",
    &["target", "system", "dimm"],
);
pub static MEMORY_SPEED_MHZ: MetricDef = gauge(
    "redfish_memory_speed_mhz",
    "Memory module operating speed in MHz",
    &["target", "system", "dimm"],
);

// Storage
pub static STORAGE_HEALTH: MetricDef = gauge(
    "redfish_storage_health",
    "Storage subsystem health",
    &["target", "system", "storage"],
);
pub static STORAGE_CONTROLLER_HEALTH: MetricDef = gauge(
    "redfish_storage_controller_health",
    "Storage controller health",
    &["target", "system", "storage", "controller"],
);
pub static DRIVE_HEALTH: MetricDef = gauge(
    "redfish_drive_health",
    "Drive health",
    &["target", "system", "chassis", "storage", "drive"],
);
pub static DRIVE_CAPACITY_BYTES: MetricDef = gauge(
    "redfish_drive_capacity_bytes",
    "Drive capacity in bytes",
    &["target", "system", "chassis", "storage", "drive"],
);
pub static DRIVE_FAILURE_PREDICTED: MetricDef = gauge(
    "redfish_drive_failure_predicted",
    "Whether the drive predicts a failure (1) or not (0)",
    &["target", "system", "chassis", "storage", "drive"],
);
pub static DRIVE_LIFE_LEFT_PERCENT: MetricDef = gauge(
    "redfish_drive_life_left_percent",
    "Predicted remaining media life in percent",
    &["target", "system", "chassis", "storage", "drive"],
);

// Chassis
pub static CHASSIS_INFO: MetricDef = gauge(
    "redfish_chassis_info",
    "Chassis information",
    &["target", "chassis", "chassis_type", "manufacturer", "model", "serial_number"],
);
pub static CHASSIS_HEALTH: MetricDef = gauge(
    "redfish_chassis_health",
    "Chassis health",
    &["target", "chassis"],
);
pub static CHASSIS_POWER_STATE: MetricDef = gauge(
    "redfish_chassis_power_state",
    "Chassis power state",
    &["target", "chassis"],
);

// Thermal
pub static TEMPERATURE_CELSIUS: MetricDef = gauge(
    "redfish_temperature_celsius",
    "Temperature sensor reading in degrees Celsius",
    &["target", "chassis", "sensor"],
);
pub static TEMPERATURE_UPPER_CRITICAL_CELSIUS: MetricDef = gauge(
    "redfish_temperature_upper_critical_celsius",
    "Upper critical threshold of the temperature sensor",
    &["target", "chassis", "sensor"],
);
pub static TEMPERATURE_HEALTH: MetricDef = gauge(
    "redfish_temperature_health",
    "Temperature sensor health",
    &["target", "chassis", "sensor"],
);
pub static FAN_READING: MetricDef = gauge(
    "redfish_fan_reading",
    "Fan speed in the unit given by the unit label",
    &["target", "chassis", "fan", "unit"],
);
pub static FAN_HEALTH: MetricDef = gauge(
    "redfish_fan_health",
    "Fan health",
    &["target", "chassis", "fan"],
);

// Power
pub static POWER_CONSUMED_WATTS: MetricDef = gauge(
    "redfish_power_consumed_watts",
    "Power consumed by the chassis in watts",
    &["target", "chassis", "control"],
);
pub static POWER_CAPACITY_WATTS: MetricDef = gauge(
    "redfish_power_capacity_watts",
    "Power capacity available to the chassis in watts",
    &["target", "chassis", "control"],
);
pub static POWER_AVERAGE_WATTS: MetricDef = gauge(
    "redfish_power_average_watts",
    "Average power consumption over the BMC measurement window",
    &["target", "chassis", "control"],
);
pub static PSU_HEALTH: MetricDef = gauge(
    "redfish_psu_health",
    "Power supply health",
    &["target", "chassis", "psu"],
);
pub static PSU_INPUT_WATTS: MetricDef = gauge(
    "redfish_psu_input_watts",
    "Power supply input power in watts",
    &["target", "chassis", "psu"],
);
pub static PSU_OUTPUT_WATTS: MetricDef = gauge(
    "redfish_psu_output_watts",
    "Power supply output power in watts",
    &["target", "chassis", "psu"],
);
pub static PSU_CAPACITY_WATTS: MetricDef = gauge(
    "redfish_psu_capacity_watts",
    "Power supply rated capacity in watts",
    &["target", "chassis", "psu"],
);
pub static VOLTAGE_VOLTS: MetricDef = gauge(
    "redfish_voltage_volts",
    "Voltage sensor reading in volts",
    &["target", "chassis", "sensor"],
);
pub static VOLTAGE_HEALTH: MetricDef = gauge(
    "redfish_voltage_health",
    "Voltage sensor health",
    &["target", "chassis", "sensor"],
);

// Sensors collection
pub static SENSOR_READING: MetricDef = gauge(
    "redfish_sensor_reading",
    "Generic sensor reading in the unit given by the unit label",
    &["target", "chassis", "sensor", "reading_type", "unit"],
);
pub static SENSOR_HEALTH: MetricDef = gauge(
    "redfish_sensor_health",
    "Generic sensor health",
    &["target", "chassis", "sensor"],
);
pub static SENSOR_LIFETIME_READING: MetricDef = counter(
    "redfish_sensor_lifetime_reading_total",
    "Accumulated sensor reading since the sensor was last reset",
    &["target", "chassis", "sensor", "unit"],
);

// Managers
pub static MANAGER_INFO: MetricDef = gauge(
    "redfish_manager_info",
    "Management controller information",
    &["target", "manager", "manager_type", "model", "firmware_version"],
);
pub static MANAGER_HEALTH: MetricDef = gauge(
    "redfish_manager_health",
    "Management controller health",
    &["target", "manager"],
);

/// Every definition, used for lookups and consistency checks.
pub static ALL: &[&MetricDef] = &[
    &UP,
    &SCRAPE_STATUS,
    &SCRAPE_DURATION_SECONDS,
    &SCRAPE_RESOURCES_SKIPPED,
    &SYSTEM_INFO,
    &SYSTEM_HEALTH,
    &SYSTEM_POWER_STATE,
    &SYSTEM_PROCESSOR_COUNT,
    &SYSTEM_MEMORY_GIB,
    &PROCESSOR_HEALTH,
    &PROCESSOR_CORES,
    &PROCESSOR_THREADS,
    &PROCESSOR_MAX_SPEED_MHZ,
    &MEMORY_HEALTH,
    &MEMORY_CAPACITY_MIB,
    &MEMORY_SPEED_MHZ,
    &STORAGE_HEALTH,
    &STORAGE_CONTROLLER_HEALTH,
    &DRIVE_HEALTH,
    &DRIVE_CAPACITY_BYTES,
    &DRIVE_FAILURE_PREDICTED,
    &DRIVE_LIFE_LEFT_PERCENT,
    &CHASSIS_INFO,
    &CHASSIS_HEALTH,
    &CHASSIS_POWER_STATE,
    &TEMPERATURE_CELSIUS,
    &TEMPERATURE_UPPER_CRITICAL_CELSIUS,
    &TEMPERATURE_HEALTH,
    &FAN_READING,
    &FAN_HEALTH,
    &POWER_CONSUMED_WATTS,
    &POWER_CAPACITY_WATTS,
    &POWER_AVERAGE_WATTS,
    &PSU_HEALTH,
    &PSU_INPUT_WATTS,
    &PSU_OUTPUT_WATTS,
    &PSU_CAPACITY_WATTS,
    &VOLTAGE_VOLTS,
    &VOLTAGE_HEALTH,
    &SENSOR_READING,
    &SENSOR_HEALTH,
    &SENSOR_LIFETIME_READING,
    &MANAGER_INFO,
    &MANAGER_HEALTH,
];
