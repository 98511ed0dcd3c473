//! Register tables for both device generations.
//!
//! Order matches the device's published sensor list. Keys are unique within
//! a table.

use crate::register::{DeviceGeneration, RegisterDescriptor, Unit};

const WORKING_MODE_LABELS_GEN1: &[(i64, &str)] = &[
    (0, "Outdoor Portable"),
    (1, "Self-consumed Prioritized"),
    (2, "Charge/Discharge Schedule"),
    (4, "Real-time Control"),
    (5, "Charge/Discharge Schedule"),
];

const BATTERY_STATE_LABELS: &[(i64, &str)] = &[
    (1000, "Static"),
    (1001, "Charging"),
    (1002, "Discharging"),
];

const METER_CONNECTION_LABELS: &[(i64, &str)] = &[
    (1000, "Enable"),
    (1001, "Disable"),
];

const WORKING_MODE_LABELS_GEN2: &[(i64, &str)] = &[
    (1, "Self-consumed Prioritized"),
    (2, "Charge/Discharge Schedule"),
    (4, "Real-time Control"),
    (5, "Charge/Discharge Schedule"),
];

const GRID_CHARGING_LABELS: &[(i64, &str)] = &[
    (1000, "Disable"),
    (1001, "Enable"),
];

pub static GEN1: &[RegisterDescriptor] = &[
    RegisterDescriptor::text(0, "Serial Number"),
    RegisterDescriptor::enumeration(7101, "Working Mode", WORKING_MODE_LABELS_GEN1),
    RegisterDescriptor::numeric(1664, "DC Input Power 1", Unit::Watt),
    RegisterDescriptor::numeric(1665, "DC Input Power 2", Unit::Watt),
    RegisterDescriptor::numeric(2108, "Total AC Output Power", Unit::Watt),
    RegisterDescriptor::numeric(2101, "Total AC Input Power", Unit::Watt),
    RegisterDescriptor::numeric(1502, "Daily Production", Unit::KiloWattHour).counter(),
    RegisterDescriptor::numeric(1505, "Cumulative Production", Unit::KiloWattHour)
        .counter()
        .scaled(0.001),
    RegisterDescriptor::numeric(2107, "Total AC Input Energy", Unit::KiloWattHour).counter(),
    RegisterDescriptor::numeric(1501, "Total DC Output Power", Unit::Watt),
    RegisterDescriptor::numeric(6000, "Battery Power", Unit::Watt),
    RegisterDescriptor::enumeration(6001, "Battery State", BATTERY_STATE_LABELS),
    RegisterDescriptor::numeric(6002, "Battery SOC", Unit::Percent),
    RegisterDescriptor::numeric(6105, "Emergency Power Supply", Unit::Percent),
    RegisterDescriptor::numeric(6004, "Battery Daily Charging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::numeric(6005, "Battery Daily Discharging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::numeric(6006, "Battery Total Charging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::numeric(6007, "Battery Total Discharging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::enumeration(7120, "Meter Connection Status", METER_CONNECTION_LABELS),
    RegisterDescriptor::numeric(21028, "Meter Power", Unit::Watt),
];

pub static GEN2: &[RegisterDescriptor] = &[
    RegisterDescriptor::text(0, "Serial Number"),
    RegisterDescriptor::text(1118, "Firmware EMS"),
    RegisterDescriptor::text(1109, "Firmware BMS-MB"),
    RegisterDescriptor::text(1119, "Firmware PCS"),
    RegisterDescriptor::text(1120, "Firmware DCDC"),
    RegisterDescriptor::text(1136, "Firmware DCDC1"),
    RegisterDescriptor::text(1137, "Firmware BMS1"),
    RegisterDescriptor::text(1138, "Firmware DCDC2"),
    RegisterDescriptor::text(1139, "Firmware BMS2"),
    RegisterDescriptor::text(1140, "Firmware DCDC3"),
    RegisterDescriptor::text(1141, "Firmware BMS3"),
    RegisterDescriptor::text(1142, "Firmware DCDC4"),
    RegisterDescriptor::text(1143, "Firmware BMS4"),
    RegisterDescriptor::text(1098, "Firmware DCDC5"),
    RegisterDescriptor::text(1099, "Firmware BMS5"),
    RegisterDescriptor::enumeration(7101, "Working Mode", WORKING_MODE_LABELS_GEN2),
    RegisterDescriptor::numeric(142, "Rated Capacity", Unit::KiloWattHour),
    RegisterDescriptor::numeric(6105, "Emergency Power Supply", Unit::Percent),
    RegisterDescriptor::enumeration(2618, "Grid Charging", GRID_CHARGING_LABELS),
    RegisterDescriptor::numeric(11009, "Inverter Input Limit", Unit::Watt),
    RegisterDescriptor::numeric(2101, "Total AC Input Power", Unit::Watt),
    RegisterDescriptor::numeric(2108, "Total AC Output Power", Unit::Watt),
    RegisterDescriptor::numeric(11010, "Feed-in Power Limit", Unit::Watt),
    RegisterDescriptor::numeric(667, "Bypass Power", Unit::Watt),
    RegisterDescriptor::numeric(2107, "Total AC Output Energy", Unit::KiloWattHour).counter(),
    RegisterDescriptor::numeric(2104, "Total AC Input Energy", Unit::KiloWattHour)
        .counter()
        .scaled(0.001),
    RegisterDescriptor::numeric(2105, "Off-grid Output Energy", Unit::KiloWattHour).counter(),
    RegisterDescriptor::numeric(11034, "Bypass Input Energy", Unit::KiloWattHour)
        .counter()
        .scaled(0.001),
    RegisterDescriptor::numeric(1502, "Daily PV Generation", Unit::KiloWattHour).counter(),
    RegisterDescriptor::numeric(6004, "Battery Daily Charging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::numeric(6005, "Battery Daily Discharging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::numeric(6006, "Battery Total Charging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::numeric(6007, "Battery Total Discharging Energy", Unit::KiloWattHour)
        .counter(),
    RegisterDescriptor::enumeration(7120, "Meter Connection Status", METER_CONNECTION_LABELS),
    RegisterDescriptor::numeric(11016, "Meter Power", Unit::Watt),
    RegisterDescriptor::numeric(2600, "Grid Voltage", Unit::Volt),
    RegisterDescriptor::numeric(2612, "Grid Frequency", Unit::Hertz),
    RegisterDescriptor::enumeration(6001, "Battery State", BATTERY_STATE_LABELS),
    RegisterDescriptor::numeric(6000, "Battery Power", Unit::Watt),
    RegisterDescriptor::numeric(6002, "Total Battery SOC", Unit::Percent),
    RegisterDescriptor::text(9008, "Battery SN Main"),
    RegisterDescriptor::numeric(9000, "Battery SOC Main", Unit::Percent),
    RegisterDescriptor::numeric(9004, "Battery Voltage Main", Unit::Volt),
    RegisterDescriptor::numeric(9013, "Battery Current Main", Unit::Ampere),
    RegisterDescriptor::numeric(9012, "Battery Temperature Main", Unit::Celsius),
    RegisterDescriptor::text(9032, "Battery SN Slave 1"),
    RegisterDescriptor::numeric(9016, "Battery SOC Slave 1", Unit::Percent),
    RegisterDescriptor::numeric(9020, "Battery Voltage Slave 1", Unit::Volt),
    RegisterDescriptor::numeric(19173, "Battery Current Slave 1", Unit::Ampere),
    RegisterDescriptor::numeric(9030, "Battery Temperature Slave 1", Unit::Celsius),
    RegisterDescriptor::text(9051, "Battery SN Slave 2"),
    RegisterDescriptor::numeric(9035, "Battery SOC Slave 2", Unit::Percent),
    RegisterDescriptor::numeric(9039, "Battery Voltage Slave 2", Unit::Volt),
    RegisterDescriptor::numeric(19174, "Battery Current Slave 2", Unit::Ampere),
    RegisterDescriptor::numeric(9049, "Battery Temperature Slave 2", Unit::Celsius),
    RegisterDescriptor::text(9070, "Battery SN Slave 3"),
    RegisterDescriptor::numeric(9054, "Battery SOC Slave 3", Unit::Percent),
    RegisterDescriptor::numeric(9058, "Battery Voltage Slave 3", Unit::Volt),
    RegisterDescriptor::numeric(19175, "Battery Current Slave 3", Unit::Ampere),
    RegisterDescriptor::numeric(9068, "Battery Temperature Slave 3", Unit::Celsius),
    RegisterDescriptor::text(9165, "Battery SN Slave 4"),
    RegisterDescriptor::numeric(9149, "Battery SOC Slave 4", Unit::Percent),
    RegisterDescriptor::numeric(9153, "Battery Voltage Slave 4", Unit::Volt),
    RegisterDescriptor::numeric(19176, "Battery Current Slave 4", Unit::Ampere),
    RegisterDescriptor::numeric(9163, "Battery Temperature Slave 4", Unit::Celsius),
    RegisterDescriptor::text(9218, "Battery SN Slave 5"),
    RegisterDescriptor::numeric(9202, "Battery SOC Slave 5", Unit::Percent),
    RegisterDescriptor::numeric(9206, "Battery Voltage Slave 5", Unit::Volt),
    RegisterDescriptor::numeric(19177, "Battery Current Slave 5", Unit::Ampere),
    RegisterDescriptor::numeric(9216, "Battery Temperature Slave 5", Unit::Celsius),
    RegisterDescriptor::numeric(1501, "Total DC Output Power", Unit::Watt),
    RegisterDescriptor::numeric(1632, "DC Input Current 1", Unit::Ampere),
    RegisterDescriptor::numeric(1600, "DC Input Voltage 1", Unit::Volt),
    RegisterDescriptor::numeric(1664, "DC Input Power 1", Unit::Watt),
    RegisterDescriptor::numeric(1633, "DC Input Current 2", Unit::Ampere),
    RegisterDescriptor::numeric(1601, "DC Input Voltage 2", Unit::Volt),
    RegisterDescriptor::numeric(1665, "DC Input Power 2", Unit::Watt),
    RegisterDescriptor::numeric(1634, "DC Input Current 3", Unit::Ampere),
    RegisterDescriptor::numeric(1602, "DC Input Voltage 3", Unit::Volt),
    RegisterDescriptor::numeric(1666, "DC Input Power 3", Unit::Watt),
    RegisterDescriptor::numeric(1603, "DC Input Voltage 4", Unit::Volt),
    RegisterDescriptor::numeric(1667, "DC Input Power 4", Unit::Watt),
];

pub fn for_generation(generation: DeviceGeneration) -> &'static [RegisterDescriptor] {
    match generation {
        DeviceGeneration::Gen1 => GEN1,
        DeviceGeneration::Gen2 => GEN2,
    }
}

/// Register keys polled every tick for a generation.
pub fn keys(generation: DeviceGeneration) -> Vec<u16> {
    for_generation(generation).iter().map(|r| r.key).collect()
}

pub fn descriptor(generation: DeviceGeneration, key: u16) -> Option<&'static RegisterDescriptor> {
    for_generation(generation).iter().find(|r| r.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::RegisterKind;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        for generation in [DeviceGeneration::Gen1, DeviceGeneration::Gen2] {
            let keys = keys(generation);
            let unique: HashSet<_> = keys.iter().collect();
            assert_eq!(keys.len(), unique.len(), "{} has duplicate keys", generation);
        }
    }

    #[test]
    fn generations_differ() {
        assert_eq!(GEN1.len(), 20);
        assert!(GEN2.len() > GEN1.len());
        assert!(descriptor(DeviceGeneration::Gen1, 21028).is_some());
        assert!(descriptor(DeviceGeneration::Gen2, 21028).is_none());
        assert!(descriptor(DeviceGeneration::Gen2, 11016).is_some());
    }

    #[test]
    fn counters_and_scaling() {
        let cumulative = descriptor(DeviceGeneration::Gen1, 1505).unwrap();
        assert!(cumulative.is_counter);
        assert_eq!(cumulative.scale, 0.001);

        let power = descriptor(DeviceGeneration::Gen1, 6000).unwrap();
        assert!(!power.is_counter);
        assert_eq!(power.scale, 1.0);
    }

    #[test]
    fn working_mode_labels() {
        let gen1 = descriptor(DeviceGeneration::Gen1, 7101).unwrap();
        assert!(matches!(gen1.kind, RegisterKind::Enum(_)));
        assert_eq!(gen1.label_for(0), Some("Outdoor Portable"));
        assert_eq!(gen1.label_for(1), Some("Self-consumed Prioritized"));

        let gen2 = descriptor(DeviceGeneration::Gen2, 7101).unwrap();
        assert_eq!(gen2.label_for(0), None);
        assert_eq!(gen2.label_for(5), Some("Charge/Discharge Schedule"));
    }
}
