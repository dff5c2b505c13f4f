// ── Cluster, command and attribute names ──
//
// The names the Network Controller understands for the clusters this
// crate drives. Catalog bindings may override any of them per model.

pub const ON_OFF: &str = "genOnOff";
pub const LEVEL_CONTROL: &str = "genLevelCtrl";
pub const COLOR_CONTROL: &str = "lightingColorCtrl";
pub const ELECTRICAL_MEASUREMENT: &str = "haElectricalMeasurement";
pub const METERING: &str = "seMetering";

pub mod command {
    pub const ON: &str = "on";
    pub const OFF: &str = "off";
    pub const TOGGLE: &str = "toggle";
    pub const MOVE_TO_LEVEL: &str = "moveToLevel";
    pub const MOVE_TO_COLOR_TEMP: &str = "moveToColorTemp";
    pub const MOVE_TO_COLOR: &str = "moveToColor";
    pub const MOVE_TO_HUE_AND_SATURATION: &str = "moveToHueAndSaturation";
}

pub mod attribute {
    pub const ON_OFF: &str = "onOff";
    pub const CURRENT_LEVEL: &str = "currentLevel";
    pub const COLOR_TEMPERATURE: &str = "colorTemperature";
    pub const CURRENT_X: &str = "currentX";
    pub const CURRENT_Y: &str = "currentY";
    pub const CURRENT_HUE: &str = "currentHue";
    pub const CURRENT_SATURATION: &str = "currentSaturation";
    pub const ACTIVE_POWER: &str = "activePower";
    pub const RMS_VOLTAGE: &str = "rmsVoltage";
    pub const RMS_CURRENT: &str = "rmsCurrent";
    pub const CURRENT_SUMM_DELIVERED: &str = "currentSummDelivered";
}
