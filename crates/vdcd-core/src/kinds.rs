//! Classification enums carried on the wire
//!
//! Most of these travel as plain integers. [`OutputKind`] is the exception
//! and travels as a lowercase string.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error for an integer that does not name a known variant
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value {value}")]
pub struct WireEnumError {
    pub kind: &'static str,
    pub value: u8,
}

/// Declares an enum that is (de)serialized as its integer discriminant.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = WireEnumError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )+
                    _ => Err(WireEnumError {
                        kind: stringify!($name),
                        value,
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Semantic type of a channel, interpreted by the controller
    ChannelType {
        Undefined = 0,
        Brightness = 1,
        Hue = 2,
        Saturation = 3,
        ColorTemperature = 4,
        CieX = 5,
        CieY = 6,
        BlindsShadePosition = 7,
        CurtainShadePosition = 8,
        BlindsShadeAngle = 9,
        CurtainShadeAngle = 10,
        AirflowIntensity = 11,
        AirflowDirection = 12,
        AirflowFlapPosition = 13,
        VentilationLouverPosition = 14,
    }
}

impl Default for ChannelType {
    fn default() -> Self {
        ChannelType::Undefined
    }
}

impl ChannelType {
    /// Map a raw wire value, falling back to `Undefined` for values this
    /// crate does not know yet
    pub fn from_wire_lenient(value: u8) -> Self {
        Self::try_from(value).unwrap_or_default()
    }
}

wire_enum! {
    /// Physical layout of a button
    ButtonType {
        NotDefined = 0,
        Single = 1,
        TwoWay = 2,
        FourWay = 3,
        FourWayCenter = 4,
        EightWayCenter = 5,
        OnOff = 6,
    }
}

impl Default for ButtonType {
    fn default() -> Self {
        ButtonType::NotDefined
    }
}

wire_enum! {
    /// Which element of a multi-way button an input represents
    ButtonElement {
        Center = 0,
        Down = 1,
        Up = 2,
        Left = 3,
        Right = 4,
        UpperLeft = 5,
        LowerLeft = 6,
        UpperRight = 7,
        LowerRight = 8,
    }
}

impl Default for ButtonElement {
    fn default() -> Self {
        ButtonElement::Center
    }
}

wire_enum! {
    /// Functional group (color) of a device or button
    Group {
        YellowLight = 1,
        GreyShadow = 2,
        BlueHeating = 3,
        CyanAudio = 4,
        MagentaVideo = 5,
        RedSecurity = 6,
        GreenAccess = 7,
        BlackVariable = 8,
        BlueCooling = 9,
        BlueVentilation = 10,
        BlueWindows = 11,
        BlueAir = 12,
        RoomTemperature = 48,
        RoomVentilation = 49,
    }
}

wire_enum! {
    /// Color class used by the controller for presentation
    ColorClass {
        Yellow = 1,
        Grey = 2,
        Blue = 3,
        Cyan = 4,
        Magenta = 5,
        Red = 6,
        Green = 7,
        Black = 8,
        White = 9,
    }
}

wire_enum! {
    /// System function of a binary input
    InputType {
        NoSystemFunction = 0,
        Presence = 1,
        Light = 2,
        PresenceDarkness = 3,
        Twilight = 4,
        Motion = 5,
        MotionDarkness = 6,
        Smoke = 7,
        Wind = 8,
        Rain = 9,
        SolarRadiation = 10,
        Thermostat = 11,
        DeviceLowBattery = 12,
        WindowClosed = 13,
        DoorClosed = 14,
        WindowHandle = 15,
        GarageDoorClosed = 16,
        ProtectSunlight = 17,
        HeatingSystemActivated = 18,
        HeatingSystemChangeOver = 19,
        NotAllFunctionsReady = 20,
        Malfunction = 21,
        NeedService = 22,
    }
}

impl Default for InputType {
    fn default() -> Self {
        InputType::NoSystemFunction
    }
}

wire_enum! {
    /// Where a sensor or input is used
    Usage {
        Undefined = 0,
        Room = 1,
        Outdoor = 2,
        UserInteraction = 3,
    }
}

impl Default for Usage {
    fn default() -> Self {
        Usage::Undefined
    }
}

wire_enum! {
    /// Physical quantity measured by a sensor
    SensorType {
        Undefined = 0,
        Temperature = 1,
        Humidity = 2,
        Illumination = 3,
        Voltage = 4,
        CarbonMonoxide = 5,
        Radon = 6,
        Gas = 7,
        DustPm10 = 8,
        DustPm2_5 = 9,
        DustPm1 = 10,
        RoomOperation = 11,
        FanSpeed = 12,
        WindSpeed = 13,
        Power = 14,
        ElectricCurrent = 15,
        Energy = 16,
        ElectricConsumption = 17,
        AirPressure = 18,
        WindDirection = 19,
        SoundPressureLevel = 20,
        Precipitation = 21,
        CarbonDioxide = 22,
        GustSpeed = 23,
        GustDirection = 24,
        GeneratedPower = 25,
        GeneratedEnergy = 26,
        WaterQuantity = 27,
        WaterFlowRate = 28,
        Length = 29,
        Mass = 30,
        Time = 31,
    }
}

impl Default for SensorType {
    fn default() -> Self {
        SensorType::Undefined
    }
}

/// Output classification of a device
///
/// The output kind decides which channels are legal on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Basic,
    Light,
    ColorLight,
    CtLight,
    MovingLight,
    HeatingValve,
    Ventilation,
    FanCoilUnit,
    Shadow,
    Action,
}

impl OutputKind {
    /// The wire spelling of this output kind
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Basic => "basic",
            OutputKind::Light => "light",
            OutputKind::ColorLight => "colorlight",
            OutputKind::CtLight => "ctlight",
            OutputKind::MovingLight => "movinglight",
            OutputKind::HeatingValve => "heatingvalve",
            OutputKind::Ventilation => "ventilation",
            OutputKind::FanCoilUnit => "fancoilunit",
            OutputKind::Shadow => "shadow",
            OutputKind::Action => "action",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
