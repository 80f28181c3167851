use crate::traits::HalError;
use serde::Deserialize;

pub const MIN_BIT_WIDTH: u8 = 3;
pub const MAX_BIT_WIDTH: u8 = 16;

/// Clock and control settings for one GSPI instance, usually the
/// `[gspi]` table of a larger config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GspiSettings {
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "default_soc_pll_mm_count")]
    pub soc_pll_mm_count_value: u16,
    #[serde(default = "default_intf_pll_500_control")]
    pub intf_pll_500_control_value: u16,
    #[serde(default = "default_intf_pll_clock")]
    pub intf_pll_clock: u32,
    #[serde(default = "default_intf_pll_reference_clock")]
    pub intf_pll_reference_clock: u32,
    #[serde(default = "default_soc_pll_clock")]
    pub soc_pll_clock: u32,
    #[serde(default = "default_soc_pll_reference_clock")]
    pub soc_pll_reference_clock: u32,
    #[serde(default)]
    pub division_factor: u16,
}

fn default_soc_pll_mm_count() -> u16 {
    0xA4
}
fn default_intf_pll_500_control() -> u16 {
    0xD900
}
fn default_intf_pll_clock() -> u32 {
    180_000_000
}
fn default_intf_pll_reference_clock() -> u32 {
    80_000_000
}
fn default_soc_pll_clock() -> u32 {
    20_000_000
}
fn default_soc_pll_reference_clock() -> u32 {
    40_000_000
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            soc_pll_mm_count_value: default_soc_pll_mm_count(),
            intf_pll_500_control_value: default_intf_pll_500_control(),
            intf_pll_clock: default_intf_pll_clock(),
            intf_pll_reference_clock: default_intf_pll_reference_clock(),
            soc_pll_clock: default_soc_pll_clock(),
            soc_pll_reference_clock: default_soc_pll_reference_clock(),
            division_factor: 0,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), HalError> {
        let clocks = [
            ("intf_pll_clock", self.intf_pll_clock),
            ("intf_pll_reference_clock", self.intf_pll_reference_clock),
            ("soc_pll_clock", self.soc_pll_clock),
            ("soc_pll_reference_clock", self.soc_pll_reference_clock),
        ];
        for (name, hz) in clocks {
            if hz == 0 {
                return Err(HalError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    Mode0,
    Mode3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaveSelectMode {
    HwOutput,
    SwOutput,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_bit_width")]
    pub bit_width: u8,
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    #[serde(default = "default_clock_mode")]
    pub clock_mode: ClockMode,
    #[serde(default = "default_slave_select_mode")]
    pub slave_select_mode: SlaveSelectMode,
    #[serde(default = "default_swap_read")]
    pub swap_read: bool,
    #[serde(default)]
    pub swap_write: bool,
}

fn default_bit_width() -> u8 {
    8
}
fn default_bitrate() -> u32 {
    40_000_000
}
fn default_clock_mode() -> ClockMode {
    ClockMode::Mode3
}
fn default_slave_select_mode() -> SlaveSelectMode {
    SlaveSelectMode::HwOutput
}
fn default_swap_read() -> bool {
    true
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bit_width: default_bit_width(),
            bitrate: default_bitrate(),
            clock_mode: default_clock_mode(),
            slave_select_mode: default_slave_select_mode(),
            swap_read: default_swap_read(),
            swap_write: false,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), HalError> {
        if !(MIN_BIT_WIDTH..=MAX_BIT_WIDTH).contains(&self.bit_width) {
            return Err(HalError::InvalidConfig(format!(
                "bit_width {} outside {MIN_BIT_WIDTH}..={MAX_BIT_WIDTH}",
                self.bit_width
            )));
        }
        if self.bitrate == 0 {
            return Err(HalError::InvalidConfig("bitrate must be non-zero".into()));
        }
        Ok(())
    }
}

impl GspiSettings {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
