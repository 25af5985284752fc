//! Declarative per-family protocol tables.
//!
//! Everything family specific lives here: which requests to send, how the
//! payloads are laid out, and which derived sensors to compute. The decoder
//! and transport never branch on the family, so supporting a new product line
//! means adding a `FamilyProtocol` entry to `REGISTRY` and nothing else.

use serde::Serialize;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::goodwe::labels::{self, LabelTable};
use crate::goodwe::packet::{Checksum, ModbusFunction, Request};

// {{{ DeviceFamily
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum DeviceFamily {
    ET,
    ES,
    EM,
}

impl DeviceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceFamily::ET => "ET",
            DeviceFamily::ES => "ES",
            DeviceFamily::EM => "EM",
        }
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DeviceFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ET" => Ok(DeviceFamily::ET),
            "ES" => Ok(DeviceFamily::ES),
            "EM" => Ok(DeviceFamily::EM),
            _ => Err(anyhow::anyhow!(
                "registry.rs:unknown inverter family {:?} (expected ET, ES or EM)",
                s
            )),
        }
    }
} // }}}

// {{{ FieldSpec
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Width {
    One = 1,
    Two = 2,
    Four = 4,
}

impl Width {
    pub const fn bytes(self) -> usize {
        self as usize
    }

    pub const fn all_ones(self) -> u32 {
        match self {
            Width::One => 0xFF,
            Width::Two => 0xFFFF,
            Width::Four => 0xFFFF_FFFF,
        }
    }
}

/// Rational multiplier applied to the raw integer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Scale {
    pub num: i32,
    pub den: i32,
}

impl Scale {
    pub const ONE: Scale = Scale { num: 1, den: 1 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn is_one(&self) -> bool {
        self.num == self.den
    }

    // multiply before dividing so 300 * 1/10 is exactly 30.0
    pub fn apply(&self, raw: i64) -> f64 {
        (raw * self.num as i64) as f64 / self.den as f64
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Pv,
    Ac,
    Ups,
    Bat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Human readable name, for hosts that present sensors to people.
    pub title: &'static str,
    pub offset: usize,
    pub width: Width,
    pub signed: bool,
    pub scale: Scale,
    pub unit: &'static str,
    pub kind: Option<SensorKind>,
    pub labels: Option<LabelTable>,
    /// Raw value meaning "not available". Unsigned fields default to all ones.
    pub sentinel: Option<u32>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, offset: usize, width: Width, signed: bool) -> Self {
        Self {
            name,
            title: "",
            offset,
            width,
            signed,
            scale: Scale::ONE,
            unit: "",
            kind: None,
            labels: None,
            sentinel: if signed { None } else { Some(width.all_ones()) },
        }
    }

    pub const fn u8(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, Width::One, false)
    }
    pub const fn u16(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, Width::Two, false)
    }
    pub const fn u32(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, Width::Four, false)
    }
    pub const fn i16(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, Width::Two, true)
    }
    pub const fn i32(name: &'static str, offset: usize) -> Self {
        Self::new(name, offset, Width::Four, true)
    }

    pub const fn title(self, title: &'static str) -> Self {
        Self { title, ..self }
    }
    pub const fn scaled(self, num: i32, den: i32) -> Self {
        Self {
            scale: Scale::new(num, den),
            ..self
        }
    }
    pub const fn unit(self, unit: &'static str) -> Self {
        Self { unit, ..self }
    }
    pub const fn kind(self, kind: SensorKind) -> Self {
        Self {
            kind: Some(kind),
            ..self
        }
    }
    pub const fn labels(self, labels: LabelTable) -> Self {
        Self {
            labels: Some(labels),
            ..self
        }
    }
    pub const fn sentinel(self, raw: Option<u32>) -> Self {
        Self {
            sentinel: raw,
            ..self
        }
    }

    // shorthands for the common register encodings
    pub const fn voltage(name: &'static str, offset: usize) -> Self {
        Self::u16(name, offset).scaled(1, 10).unit("V")
    }
    pub const fn current(name: &'static str, offset: usize) -> Self {
        Self::i16(name, offset).scaled(1, 10).unit("A")
    }
    pub const fn power(name: &'static str, offset: usize) -> Self {
        Self::i32(name, offset).unit("W")
    }
    pub const fn power2(name: &'static str, offset: usize) -> Self {
        Self::i16(name, offset).unit("W")
    }
    pub const fn frequency(name: &'static str, offset: usize) -> Self {
        Self::u16(name, offset).scaled(1, 100).unit("Hz")
    }
    pub const fn temperature(name: &'static str, offset: usize) -> Self {
        Self::i16(name, offset).scaled(1, 10).unit("C")
    }
    pub const fn energy(name: &'static str, offset: usize) -> Self {
        Self::u32(name, offset).scaled(1, 10).unit("kWh")
    }
    pub const fn energy2(name: &'static str, offset: usize) -> Self {
        Self::u16(name, offset).scaled(1, 10).unit("kWh")
    }

    pub fn end(&self) -> usize {
        self.offset + self.width.bytes()
    }

    pub fn info(&self) -> SensorInfo {
        SensorInfo {
            name: self.name,
            title: self.title,
            unit: self.unit,
            kind: self.kind,
        }
    }
} // }}}

// {{{ DerivedSpec
/// How a derived sensor is computed from sensors decoded earlier in the
/// same map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Formula {
    /// Signed sum of the named sensors.
    Sum(&'static [(i8, &'static str)]),
    /// Product of two sensors, rounded half to even.
    Product(&'static str, &'static str),
    /// Grid direction from the sign of a power sensor, with a +-90W dead band.
    GridMode(&'static str),
    /// `value`, negated when `mode` reports power drawn from the grid.
    Directed {
        value: &'static str,
        mode: &'static str,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub unit: &'static str,
    pub kind: Option<SensorKind>,
    pub formula: Formula,
}

impl DerivedSpec {
    pub const fn new(name: &'static str, unit: &'static str, formula: Formula) -> Self {
        Self {
            name,
            title: "",
            unit,
            kind: None,
            formula,
        }
    }

    pub const fn title(self, title: &'static str) -> Self {
        Self { title, ..self }
    }

    pub const fn kind(self, kind: SensorKind) -> Self {
        Self {
            kind: Some(kind),
            ..self
        }
    }

    pub fn info(&self) -> SensorInfo {
        SensorInfo {
            name: self.name,
            title: self.title,
            unit: self.unit,
            kind: self.kind,
        }
    }
} // }}}

/// What a host needs to know about a sensor before any value arrives.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct SensorInfo {
    pub name: &'static str,
    pub title: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SensorKind>,
}

// {{{ FieldMap
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldMap {
    /// Payloads shorter than this are rejected outright.
    pub min_len: usize,
    pub fields: &'static [FieldSpec],
    pub derived: &'static [DerivedSpec],
}

impl FieldMap {
    /// Number of sensors a successful decode produces.
    pub fn len(&self) -> usize {
        self.fields.len() + self.derived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sensors().map(|s| s.name)
    }

    /// Raw fields first, then derived sensors, in the order `decode` emits them.
    pub fn sensors(&self) -> impl Iterator<Item = SensorInfo> + '_ {
        self.fields
            .iter()
            .map(FieldSpec::info)
            .chain(self.derived.iter().map(DerivedSpec::info))
    }
} // }}}

// {{{ FamilyProtocol
/// One request and the layout of the payload it returns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Block {
    pub request: Request,
    pub fields: FieldMap,
}

/// Where the identification strings sit in the device info payload.
#[derive(Clone, Debug, PartialEq)]
pub struct InfoLayout {
    pub min_len: usize,
    pub model: Range<usize>,
    pub serial: Range<usize>,
    pub firmware: Range<usize>,
}

#[derive(Debug)]
pub struct FamilyProtocol {
    pub family: DeviceFamily,
    pub device_info: Request,
    pub info_layout: InfoLayout,
    /// Polled in order; their sensors are merged into one reading.
    pub runtime: &'static [Block],
    /// Substrings of the reported model name identifying this family among
    /// families that answer the same device info request.
    pub model_tags: &'static [&'static str],
}

impl FamilyProtocol {
    pub fn checksum(&self) -> Checksum {
        self.device_info.checksum()
    }

    pub fn matches_model(&self, model: &str) -> bool {
        self.model_tags.iter().any(|tag| model.contains(tag))
    }
} // }}}

pub fn lookup(family: DeviceFamily) -> Result<&'static FamilyProtocol> {
    REGISTRY
        .iter()
        .find(|p| p.family == family)
        .ok_or(Error::UnknownFamily(family))
}

/// The primary runtime field map of `family`.
pub fn field_map(family: DeviceFamily) -> Result<&'static FieldMap> {
    lookup(family)?
        .runtime
        .first()
        .map(|b| &b.fields)
        .ok_or(Error::UnknownFamily(family))
}

/// Every sensor a reading of `family` carries, across all its runtime blocks.
pub fn sensors(family: DeviceFamily) -> Result<Vec<SensorInfo>> {
    Ok(lookup(family)?
        .runtime
        .iter()
        .flat_map(|b| b.fields.sensors())
        .collect())
}

use SensorKind::*;

// {{{ ET
const ET_ADDRESS: u8 = 0xF7;

const ET_RUNNING_DATA: &[FieldSpec] = &[
    FieldSpec::voltage("vpv1", 6).title("PV1 Voltage").kind(Pv),
    FieldSpec::current("ipv1", 8).title("PV1 Current").kind(Pv),
    FieldSpec::power("ppv1", 10).title("PV1 Power").kind(Pv),
    FieldSpec::voltage("vpv2", 14).title("PV2 Voltage").kind(Pv),
    FieldSpec::current("ipv2", 16).title("PV2 Current").kind(Pv),
    FieldSpec::power("ppv2", 18).title("PV2 Power").kind(Pv),
    FieldSpec::voltage("vgrid", 42).title("On-grid 1 Voltage").kind(Ac),
    FieldSpec::current("igrid", 44).title("On-grid Current").kind(Ac),
    FieldSpec::frequency("fgrid", 46).title("On-grid Frequency").kind(Ac),
    FieldSpec::power("pgrid", 48).title("On-grid Power").kind(Ac),
    FieldSpec::voltage("vgrid2", 52).title("On-grid2 Voltage").kind(Ac),
    FieldSpec::current("igrid2", 54).title("On-grid2 Current").kind(Ac),
    FieldSpec::frequency("fgrid2", 56).title("On-grid2 Frequency").kind(Ac),
    FieldSpec::power("pgrid2", 58).title("On-grid2 Power").kind(Ac),
    FieldSpec::voltage("vgrid3", 62).title("On-grid3 Voltage").kind(Ac),
    FieldSpec::current("igrid3", 64).title("On-grid3 Current").kind(Ac),
    FieldSpec::frequency("fgrid3", 66).title("On-grid3 Frequency").kind(Ac),
    FieldSpec::power("pgrid3", 68).title("On-grid3 Power").kind(Ac),
    FieldSpec::power("total_inverter_power", 74).title("Total Power").kind(Ac),
    FieldSpec::power("active_power", 78).title("Active Power").kind(Ac),
    FieldSpec::voltage("backup_v1", 90).title("Back-up1 Voltage").kind(Ups),
    FieldSpec::current("backup_i1", 92).title("Back-up1 Current").kind(Ups),
    FieldSpec::frequency("backup_f1", 94).title("Back-up1 Frequency").kind(Ups),
    FieldSpec::power("backup_p1", 98).title("Back-up1 Power").kind(Ups),
    FieldSpec::voltage("backup_v2", 102).title("Back-up2 Voltage").kind(Ups),
    FieldSpec::current("backup_i2", 104).title("Back-up2 Current").kind(Ups),
    FieldSpec::frequency("backup_f2", 106).title("Back-up2 Frequency").kind(Ups),
    FieldSpec::power("backup_p2", 110).title("Back-up2 Power").kind(Ups),
    FieldSpec::voltage("backup_v3", 114).title("Back-up3 Voltage").kind(Ups),
    FieldSpec::current("backup_i3", 116).title("Back-up3 Current").kind(Ups),
    FieldSpec::frequency("backup_f3", 118).title("Back-up3 Frequency").kind(Ups),
    FieldSpec::power("backup_p3", 122).title("Back-up3 Power").kind(Ups),
    FieldSpec::power("load_p1", 126).title("Load 1").kind(Ac),
    FieldSpec::power("load_p2", 130).title("Load 2").kind(Ac),
    FieldSpec::power("load_p3", 134).title("Load 3").kind(Ac),
    FieldSpec::power("backup_ptotal", 138).title("Back-up Power").kind(Ups),
    FieldSpec::power("pload", 142).title("Load").kind(Ac),
    FieldSpec::temperature("temperature2", 148).title("Inverter Temperature 2").kind(Ac),
    FieldSpec::temperature("temperature", 152).title("Inverter Temperature").kind(Ac),
    FieldSpec::voltage("vbattery1", 160).title("Battery Voltage").kind(Bat),
    FieldSpec::current("ibattery1", 162).title("Battery Current").kind(Bat),
    FieldSpec::u16("battery_mode", 168)
        .title("Battery Mode")
        .labels(labels::BATTERY_MODES_ET)
        .kind(Bat),
    FieldSpec::u16("safety_country", 172)
        .title("Safety Country")
        .labels(labels::SAFETY_COUNTRIES_ET),
    FieldSpec::u16("work_mode", 174).title("Work Mode").labels(labels::WORK_MODES_ET),
    FieldSpec::u32("error_codes", 178).title("Error Codes"),
    FieldSpec::energy("e_total", 182).title("Total PV Generation"),
    FieldSpec::energy("e_day", 186).title("Today's PV Generation"),
    FieldSpec::u32("diagnose_result", 240).title("Diag Status"),
];

const ET_RUNNING_DATA_DERIVED: &[DerivedSpec] = &[
    DerivedSpec::new("ppv", "W", Formula::Sum(&[(1, "ppv1"), (1, "ppv2")]))
        .title("PV Power")
        .kind(Pv),
    DerivedSpec::new(
        "load_ptotal",
        "W",
        Formula::Sum(&[(1, "load_p1"), (1, "load_p2"), (1, "load_p3")]),
    )
    .title("Load Total")
    .kind(Ac),
    DerivedSpec::new("pbattery1", "W", Formula::Product("vbattery1", "ibattery1"))
        .title("Battery Power")
        .kind(Bat),
    DerivedSpec::new("grid_in_out", "", Formula::GridMode("active_power"))
        .title("On-grid Mode")
        .kind(Ac),
    DerivedSpec::new(
        "house_consumption",
        "W",
        Formula::Sum(&[
            (1, "ppv1"),
            (1, "ppv2"),
            (1, "pbattery1"),
            (-1, "active_power"),
        ]),
    )
    .title("House Consumption"),
];

const ET_BATTERY_INFO: &[FieldSpec] = &[
    FieldSpec::u16("battery_bms", 0).title("Battery BMS").kind(Bat),
    FieldSpec::u16("battery_index", 2).title("Battery Index").kind(Bat),
    FieldSpec::temperature("battery_temperature", 6).title("Battery Temperature").kind(Bat),
    FieldSpec::u16("battery_charge_limit", 8).title("Battery Charge Limit").unit("A").kind(Bat),
    FieldSpec::u16("battery_discharge_limit", 10)
        .title("Battery Discharge Limit")
        .unit("A")
        .kind(Bat),
    FieldSpec::u16("battery_status", 12).title("Battery Status").kind(Bat),
    FieldSpec::u16("battery_soc", 14).title("Battery State of Charge").unit("%").kind(Bat),
    FieldSpec::u16("battery_soh", 16).title("Battery State of Health").unit("%").kind(Bat),
    FieldSpec::u16("battery_warning", 20).title("Battery Warning").kind(Bat),
];

const ET_BLOCKS: &[Block] = &[
    Block {
        request: Request::Modbus {
            address: ET_ADDRESS,
            function: ModbusFunction::ReadHolding,
            register: 0x891C,
            count: 0x7D,
        },
        fields: FieldMap {
            min_len: 0x7D * 2,
            fields: ET_RUNNING_DATA,
            derived: ET_RUNNING_DATA_DERIVED,
        },
    },
    Block {
        request: Request::Modbus {
            address: ET_ADDRESS,
            function: ModbusFunction::ReadHolding,
            register: 0x9088,
            count: 0x0B,
        },
        fields: FieldMap {
            min_len: 0x0B * 2,
            fields: ET_BATTERY_INFO,
            derived: &[],
        },
    },
];
// }}}

// {{{ ES / EM
const AA55_DEVICE_INFO: Request = Request::Aa55 {
    control: 0x01,
    function: 0x02,
    payload: &[],
    reply_lens: &[76, 77],
};

// replies are 142 or 149 bytes depending on firmware
const AA55_RUNNING_DATA: Request = Request::Aa55 {
    control: 0x01,
    function: 0x06,
    payload: &[],
    reply_lens: &[133, 140],
};

const AA55_INFO_LAYOUT: InfoLayout = InfoLayout {
    min_len: 63,
    model: 5..15,
    serial: 31..47,
    firmware: 51..63,
};

const ES_RUNNING_DATA: &[FieldSpec] = &[
    FieldSpec::voltage("vpv1", 0).title("PV1 Voltage").kind(Pv),
    FieldSpec::current("ipv1", 2).title("PV1 Current").kind(Pv),
    FieldSpec::u8("pv1_mode", 4).title("PV1 Mode").labels(labels::PV_MODES).kind(Pv),
    FieldSpec::voltage("vpv2", 5).title("PV2 Voltage").kind(Pv),
    FieldSpec::current("ipv2", 7).title("PV2 Current").kind(Pv),
    FieldSpec::u8("pv2_mode", 9).title("PV2 Mode").labels(labels::PV_MODES).kind(Pv),
    FieldSpec::voltage("vbattery1", 10).title("Battery Voltage").kind(Bat),
    FieldSpec::temperature("battery_temperature", 16).title("Battery Temperature").kind(Bat),
    FieldSpec::current("ibattery1", 18).title("Battery Current").kind(Bat),
    FieldSpec::u16("battery_charge_limit", 20).title("Battery Charge Limit").unit("A").kind(Bat),
    FieldSpec::u16("battery_discharge_limit", 22)
        .title("Battery Discharge Limit")
        .unit("A")
        .kind(Bat),
    FieldSpec::u16("battery_status", 24).title("Battery Status").kind(Bat),
    FieldSpec::u8("battery_soc", 26).title("Battery State of Charge").unit("%").kind(Bat),
    FieldSpec::u8("battery_soh", 29).title("Battery State of Health").unit("%").kind(Bat),
    FieldSpec::u8("battery_mode", 30)
        .title("Battery Mode")
        .labels(labels::BATTERY_MODES_ET)
        .kind(Bat),
    FieldSpec::u16("battery_warning", 31).title("Battery Warning").kind(Bat),
    FieldSpec::u8("meter_status", 33).title("Meter status").kind(Ac),
    FieldSpec::voltage("vgrid", 34).title("On-grid Voltage").kind(Ac),
    FieldSpec::current("igrid", 36).title("On-grid Current").kind(Ac),
    FieldSpec::power2("pgrid", 38).title("On-grid Power (EzMeter)").kind(Ac),
    FieldSpec::frequency("fgrid", 40).title("On-grid Frequency").kind(Ac),
    FieldSpec::u8("grid_mode", 42).title("Work Mode").labels(labels::WORK_MODES),
    FieldSpec::voltage("vload", 43).title("Back-up Voltage").kind(Ups),
    FieldSpec::current("iload", 45).title("Back-up Current").kind(Ups),
    FieldSpec::power2("pload", 47).title("On-grid Power").kind(Ups),
    FieldSpec::frequency("fload", 49).title("Back-up Frequency").kind(Ups),
    FieldSpec::u8("load_mode", 51).title("Load Mode").labels(labels::LOAD_MODES),
    FieldSpec::u8("work_mode", 52).title("Energy Mode").labels(labels::ENERGY_MODES),
    FieldSpec::temperature("temperature", 53).title("Inverter Temperature"),
    FieldSpec::u32("error_codes", 55).title("Error Codes"),
    FieldSpec::energy("e_total", 59).title("Total PV Generation"),
    FieldSpec::u32("h_total", 63).title("Hours Total").unit("h"),
    FieldSpec::energy2("e_day", 67).title("Today's PV Generation"),
    FieldSpec::energy2("e_load_day", 69).title("Today's Load Consumption"),
    FieldSpec::energy("e_load_total", 71).title("Total Load"),
    FieldSpec::power2("total_power", 75).title("Total Power"),
    FieldSpec::u8("grid_in_out", 80).title("On-grid Mode").labels(labels::GRID_MODES).kind(Ac),
    FieldSpec::power2("pback_up", 81).title("Back-up Power").kind(Ups),
    FieldSpec::u32("diagnose_result", 89).title("Diag Status"),
];

const ES_RUNNING_DATA_DERIVED: &[DerivedSpec] = &[
    DerivedSpec::new("ppv1", "W", Formula::Product("vpv1", "ipv1")).title("PV1 Power").kind(Pv),
    DerivedSpec::new("ppv2", "W", Formula::Product("vpv2", "ipv2")).title("PV2 Power").kind(Pv),
    DerivedSpec::new("ppv", "W", Formula::Sum(&[(1, "ppv1"), (1, "ppv2")]))
        .title("PV Power")
        .kind(Pv),
    DerivedSpec::new("pbattery1", "W", Formula::Product("vbattery1", "ibattery1"))
        .title("Battery Power")
        .kind(Bat),
    DerivedSpec::new(
        "active_power",
        "W",
        Formula::Directed {
            value: "pgrid",
            mode: "grid_in_out",
        },
    )
    .title("Active Power")
    .kind(Ac),
    DerivedSpec::new(
        "plant_power",
        "W",
        Formula::Sum(&[(1, "pload"), (1, "pback_up")]),
    )
    .title("Plant Power"),
    DerivedSpec::new(
        "house_consumption",
        "W",
        Formula::Sum(&[
            (1, "ppv1"),
            (1, "ppv2"),
            (1, "pbattery1"),
            (-1, "active_power"),
        ]),
    )
    .title("House Consumption"),
];

const ES_BLOCKS: &[Block] = &[Block {
    request: AA55_RUNNING_DATA,
    fields: FieldMap {
        min_len: 133,
        fields: ES_RUNNING_DATA,
        derived: ES_RUNNING_DATA_DERIVED,
    },
}];

// EM shares the ES wire layout but has no EzMeter, so the meter readings and
// everything computed from them are left out.
const EM_RUNNING_DATA: &[FieldSpec] = &[
    FieldSpec::voltage("vpv1", 0).title("PV1 Voltage").kind(Pv),
    FieldSpec::current("ipv1", 2).title("PV1 Current").kind(Pv),
    FieldSpec::u8("pv1_mode", 4).title("PV1 Mode").labels(labels::PV_MODES).kind(Pv),
    FieldSpec::voltage("vpv2", 5).title("PV2 Voltage").kind(Pv),
    FieldSpec::current("ipv2", 7).title("PV2 Current").kind(Pv),
    FieldSpec::u8("pv2_mode", 9).title("PV2 Mode").labels(labels::PV_MODES).kind(Pv),
    FieldSpec::voltage("vbattery1", 10).title("Battery Voltage").kind(Bat),
    FieldSpec::temperature("battery_temperature", 16).title("Battery Temperature").kind(Bat),
    FieldSpec::current("ibattery1", 18).title("Battery Current").kind(Bat),
    FieldSpec::u16("battery_charge_limit", 20).title("Battery Charge Limit").unit("A").kind(Bat),
    FieldSpec::u16("battery_discharge_limit", 22)
        .title("Battery Discharge Limit")
        .unit("A")
        .kind(Bat),
    FieldSpec::u16("battery_status", 24).title("Battery Status").kind(Bat),
    FieldSpec::u8("battery_soc", 26).title("Battery State of Charge").unit("%").kind(Bat),
    FieldSpec::u8("battery_soh", 29).title("Battery State of Health").unit("%").kind(Bat),
    FieldSpec::u8("battery_mode", 30)
        .title("Battery Mode")
        .labels(labels::BATTERY_MODES_ET)
        .kind(Bat),
    FieldSpec::u16("battery_warning", 31).title("Battery Warning").kind(Bat),
    FieldSpec::voltage("vgrid", 34).title("On-grid Voltage").kind(Ac),
    FieldSpec::current("igrid", 36).title("On-grid Current").kind(Ac),
    FieldSpec::frequency("fgrid", 40).title("On-grid Frequency").kind(Ac),
    FieldSpec::u8("grid_mode", 42).title("Work Mode").labels(labels::WORK_MODES),
    FieldSpec::voltage("vload", 43).title("Back-up Voltage").kind(Ups),
    FieldSpec::current("iload", 45).title("Back-up Current").kind(Ups),
    FieldSpec::power2("pload", 47).title("On-grid Power").kind(Ups),
    FieldSpec::frequency("fload", 49).title("Back-up Frequency").kind(Ups),
    FieldSpec::u8("load_mode", 51).title("Load Mode").labels(labels::LOAD_MODES),
    FieldSpec::u8("work_mode", 52).title("Energy Mode").labels(labels::ENERGY_MODES),
    FieldSpec::temperature("temperature", 53).title("Inverter Temperature"),
    FieldSpec::u32("error_codes", 55).title("Error Codes"),
    FieldSpec::energy("e_total", 59).title("Total PV Generation"),
    FieldSpec::u32("h_total", 63).title("Hours Total").unit("h"),
    FieldSpec::energy2("e_day", 67).title("Today's PV Generation"),
    FieldSpec::energy2("e_load_day", 69).title("Today's Load Consumption"),
    FieldSpec::energy("e_load_total", 71).title("Total Load"),
    FieldSpec::power2("total_power", 75).title("Total Power"),
    FieldSpec::power2("pback_up", 81).title("Back-up Power").kind(Ups),
    FieldSpec::u32("diagnose_result", 89).title("Diag Status"),
];

const EM_RUNNING_DATA_DERIVED: &[DerivedSpec] = &[
    DerivedSpec::new("ppv1", "W", Formula::Product("vpv1", "ipv1")).title("PV1 Power").kind(Pv),
    DerivedSpec::new("ppv2", "W", Formula::Product("vpv2", "ipv2")).title("PV2 Power").kind(Pv),
    DerivedSpec::new("ppv", "W", Formula::Sum(&[(1, "ppv1"), (1, "ppv2")]))
        .title("PV Power")
        .kind(Pv),
    DerivedSpec::new("pbattery1", "W", Formula::Product("vbattery1", "ibattery1"))
        .title("Battery Power")
        .kind(Bat),
    DerivedSpec::new(
        "plant_power",
        "W",
        Formula::Sum(&[(1, "pload"), (1, "pback_up")]),
    )
    .title("Plant Power"),
];

const EM_BLOCKS: &[Block] = &[Block {
    request: AA55_RUNNING_DATA,
    fields: FieldMap {
        min_len: 93,
        fields: EM_RUNNING_DATA,
        derived: EM_RUNNING_DATA_DERIVED,
    },
}];
// }}}

/// Known families, in probing order.
pub static REGISTRY: [FamilyProtocol; 3] = [
    FamilyProtocol {
        family: DeviceFamily::ET,
        device_info: Request::Modbus {
            address: ET_ADDRESS,
            function: ModbusFunction::ReadHolding,
            register: 0x88B8,
            count: 0x21,
        },
        info_layout: InfoLayout {
            min_len: 66,
            model: 22..32,
            serial: 6..22,
            firmware: 54..66,
        },
        runtime: ET_BLOCKS,
        model_tags: &["ET", "EH", "BT", "BH"],
    },
    FamilyProtocol {
        family: DeviceFamily::ES,
        device_info: AA55_DEVICE_INFO,
        info_layout: AA55_INFO_LAYOUT,
        runtime: ES_BLOCKS,
        model_tags: &["ES", "BP"],
    },
    FamilyProtocol {
        family: DeviceFamily::EM,
        device_info: AA55_DEVICE_INFO,
        info_layout: AA55_INFO_LAYOUT,
        runtime: EM_BLOCKS,
        model_tags: &["EM"],
    },
];
