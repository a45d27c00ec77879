use thiserror::Error;

/// Which cached payload (and nested section) a sensor reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCategory {
    Battery,
    Motor,
    Distance,
    Position,
    Overall,
    Track,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Battery,
    Temperature,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Battery => "battery",
            DeviceClass::Temperature => "temperature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Measurement,
    Total,
}

impl StateClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StateClass::Measurement => "measurement",
            StateClass::Total => "total",
        }
    }
}

/// Static metadata row mapping a logical sensor name to its source field
/// and display properties. Fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDescriptor {
    pub name: &'static str,
    pub entity_suffix: &'static str,
    pub unit: &'static str,
    pub source_field: &'static str,
    pub category: SensorCategory,
    pub device_class: Option<DeviceClass>,
    pub icon: &'static str,
    pub state_class: Option<StateClass>,
    pub display_name_zh: &'static str,
}

impl SensorDescriptor {
    /// The two motor-connectivity sensors carry the cross-snapshot
    /// attribute bundle.
    pub fn has_attribute_bundle(&self) -> bool {
        self.category == SensorCategory::Motor && self.source_field == "isConnected"
    }
}

pub const DEFAULT_SENSORS: &[&str] = &["BatteryCharge"];

pub const SENSOR_CATALOG: &[SensorDescriptor] = &[
    SensorDescriptor {
        name: "BatteryCharge",
        entity_suffix: "battery_charge",
        unit: "%",
        source_field: "batteryCharging",
        category: SensorCategory::Battery,
        device_class: Some(DeviceClass::Battery),
        icon: "mdi:battery-charging-50",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "电池电量",
    },
    SensorDescriptor {
        name: "Isconnected",
        entity_suffix: "is_connected",
        unit: "",
        source_field: "isConnected",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:connection",
        state_class: None,
        display_name_zh: "连接状态",
    },
    SensorDescriptor {
        name: "TimesCharged",
        entity_suffix: "times_charged",
        unit: "x",
        source_field: "chargedTimes",
        category: SensorCategory::Battery,
        device_class: None,
        icon: "mdi:battery-charging-wireless",
        state_class: Some(StateClass::Total),
        display_name_zh: "充电次数",
    },
    SensorDescriptor {
        name: "temperatureDesc",
        entity_suffix: "temp_descr",
        unit: "",
        source_field: "temperatureDesc",
        category: SensorCategory::Battery,
        device_class: None,
        icon: "mdi:thermometer-alert",
        state_class: None,
        display_name_zh: "温度描述",
    },
    SensorDescriptor {
        name: "Temperature",
        entity_suffix: "temperature",
        unit: "°C",
        source_field: "temperature",
        category: SensorCategory::Battery,
        device_class: Some(DeviceClass::Temperature),
        icon: "mdi:thermometer",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "电池温度",
    },
    SensorDescriptor {
        name: "BatteryGrade",
        entity_suffix: "battery_grade",
        unit: "%",
        source_field: "gradeBattery",
        category: SensorCategory::Battery,
        device_class: Some(DeviceClass::Battery),
        icon: "mdi:car-battery",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "电池等级",
    },
    SensorDescriptor {
        name: "CurrentSpeed",
        entity_suffix: "current_speed",
        unit: "km/h",
        source_field: "nowSpeed",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:speedometer",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "当前速度",
    },
    SensorDescriptor {
        name: "ScooterConnected",
        entity_suffix: "scooter_connected",
        unit: "",
        source_field: "isConnected",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:motorbike-electric",
        state_class: None,
        display_name_zh: "滑板车连接",
    },
    SensorDescriptor {
        name: "IsCharging",
        entity_suffix: "is_charging",
        unit: "",
        source_field: "isCharging",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:battery-charging",
        state_class: None,
        display_name_zh: "充电状态",
    },
    SensorDescriptor {
        name: "IsLocked",
        entity_suffix: "is_locked",
        unit: "",
        source_field: "lockStatus",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:lock",
        state_class: None,
        display_name_zh: "锁定状态",
    },
    SensorDescriptor {
        name: "TimeLeft",
        entity_suffix: "time_left",
        unit: "h",
        source_field: "leftTime",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:av-timer",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "剩余时间",
    },
    SensorDescriptor {
        name: "EstimatedMileage",
        entity_suffix: "estimated_mileage",
        unit: "km",
        source_field: "estimatedMileage",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:map-marker-distance",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "预估里程",
    },
    SensorDescriptor {
        name: "centreCtrlBatt",
        entity_suffix: "centre_ctrl_batt",
        unit: "%",
        source_field: "centreCtrlBattery",
        category: SensorCategory::Motor,
        device_class: Some(DeviceClass::Battery),
        icon: "mdi:car-cruise-control",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "中央控制器电池",
    },
    SensorDescriptor {
        name: "HDOP",
        entity_suffix: "hdp",
        unit: "",
        source_field: "hdop",
        category: SensorCategory::Motor,
        device_class: None,
        icon: "mdi:map-marker",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "GPS精度",
    },
    SensorDescriptor {
        name: "Longitude",
        entity_suffix: "long",
        unit: "",
        source_field: "lng",
        category: SensorCategory::Position,
        device_class: None,
        icon: "mdi:map-marker",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "经度",
    },
    SensorDescriptor {
        name: "Latitude",
        entity_suffix: "lat",
        unit: "",
        source_field: "lat",
        category: SensorCategory::Position,
        device_class: None,
        icon: "mdi:map-marker",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "纬度",
    },
    SensorDescriptor {
        name: "Distance",
        entity_suffix: "distance",
        unit: "m",
        source_field: "distance",
        category: SensorCategory::Distance,
        device_class: None,
        icon: "mdi:map-marker-distance",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "距离",
    },
    SensorDescriptor {
        name: "RidingTime",
        entity_suffix: "riding_time",
        unit: "s",
        source_field: "ridingTime",
        category: SensorCategory::Distance,
        device_class: None,
        icon: "mdi:map-clock",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "骑行时间",
    },
    SensorDescriptor {
        name: "totalMileage",
        entity_suffix: "total_mileage",
        unit: "km",
        source_field: "totalMileage",
        category: SensorCategory::Overall,
        device_class: None,
        icon: "mdi:map-marker-distance",
        state_class: Some(StateClass::Total),
        display_name_zh: "总里程",
    },
    SensorDescriptor {
        name: "DaysInUse",
        entity_suffix: "bind_days_count",
        unit: "days",
        source_field: "bindDaysCount",
        category: SensorCategory::Overall,
        device_class: None,
        icon: "mdi:calendar-today",
        state_class: Some(StateClass::Total),
        display_name_zh: "使用天数",
    },
    SensorDescriptor {
        name: "LastTrackStartTime",
        entity_suffix: "last_track_start_time",
        unit: "",
        source_field: "startTime",
        category: SensorCategory::Track,
        device_class: None,
        icon: "mdi:clock-start",
        state_class: None,
        display_name_zh: "最后行程开始时间",
    },
    SensorDescriptor {
        name: "LastTrackEndTime",
        entity_suffix: "last_track_end_time",
        unit: "",
        source_field: "endTime",
        category: SensorCategory::Track,
        device_class: None,
        icon: "mdi:clock-end",
        state_class: None,
        display_name_zh: "最后行程结束时间",
    },
    SensorDescriptor {
        name: "LastTrackDistance",
        entity_suffix: "last_track_distance",
        unit: "m",
        source_field: "distance",
        category: SensorCategory::Track,
        device_class: None,
        icon: "mdi:map-marker-distance",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "最后行程距离",
    },
    SensorDescriptor {
        name: "LastTrackAverageSpeed",
        entity_suffix: "last_track_average_speed",
        unit: "km/h",
        source_field: "avespeed",
        category: SensorCategory::Track,
        device_class: None,
        icon: "mdi:speedometer",
        state_class: Some(StateClass::Measurement),
        display_name_zh: "最后行程平均速度",
    },
    SensorDescriptor {
        name: "LastTrackRidingtime",
        entity_suffix: "last_track_riding_time",
        unit: "",
        source_field: "ridingtime",
        category: SensorCategory::Track,
        device_class: None,
        icon: "mdi:timelapse",
        state_class: None,
        display_name_zh: "最后行程骑行时间",
    },
    SensorDescriptor {
        name: "LastTrackThumb",
        entity_suffix: "last_track_thumb",
        unit: "",
        source_field: "track_thumb",
        category: SensorCategory::Track,
        device_class: None,
        icon: "mdi:map",
        state_class: None,
        display_name_zh: "最后行程缩略图",
    },
];

pub fn descriptor(name: &str) -> Option<&'static SensorDescriptor> {
    SENSOR_CATALOG.iter().find(|entry| entry.name == name)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no sensors selected")]
    Empty,
    #[error("unknown sensor names: {0}")]
    UnknownNames(String),
}

/// Validates a configured sensor selection against the catalog and
/// resolves it to descriptors, preserving order.
pub fn resolve_selection(
    names: &[String],
) -> Result<Vec<&'static SensorDescriptor>, SelectionError> {
    if names.is_empty() {
        return Err(SelectionError::Empty);
    }

    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| descriptor(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(SelectionError::UnknownNames(unknown.join(", ")));
    }

    Ok(names
        .iter()
        .filter_map(|name| descriptor(name))
        .collect())
}
