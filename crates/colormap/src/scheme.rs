//! Color ramps as piecewise-linear stop tables.

use std::fmt;
use std::str::FromStr;

use crate::error::PlotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn to_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }

    /// Channel-wise blend, `t = 0` gives `self`
    fn blend(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// Color at position `t` of a ramp; stops are sorted by `t` from 0 to 1.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

const fn stop(t: f64, r: u8, g: u8, b: u8) -> ColorStop {
    ColorStop {
        t,
        color: Rgb::new(r, g, b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    /// Black to white; NDBI, NDMI and MNDWI charts
    Grayscale,
    /// ColorBrewer red-yellow-green; NDVI charts
    RdYlGn,
    /// Surface temperature
    Inferno,
    /// Blue-white-red around zero; index change maps
    Divergent,
    /// Pale to deep blue
    Water,
}

const GRAYSCALE: &[ColorStop] = &[stop(0.0, 0, 0, 0), stop(1.0, 255, 255, 255)];

const RDYLGN: &[ColorStop] = &[
    stop(0.0, 165, 0, 38),
    stop(0.1, 215, 48, 39),
    stop(0.2, 244, 109, 67),
    stop(0.3, 253, 174, 97),
    stop(0.4, 254, 224, 139),
    stop(0.5, 255, 255, 191),
    stop(0.6, 217, 239, 139),
    stop(0.7, 166, 217, 106),
    stop(0.8, 102, 189, 99),
    stop(0.9, 26, 152, 80),
    stop(1.0, 0, 104, 55),
];

const INFERNO: &[ColorStop] = &[
    stop(0.0, 0, 0, 4),
    stop(0.1, 22, 11, 57),
    stop(0.2, 66, 10, 104),
    stop(0.3, 106, 23, 110),
    stop(0.4, 147, 38, 103),
    stop(0.5, 188, 55, 84),
    stop(0.6, 221, 81, 58),
    stop(0.7, 243, 120, 25),
    stop(0.8, 252, 165, 10),
    stop(0.9, 246, 215, 70),
    stop(1.0, 252, 255, 164),
];

const DIVERGENT: &[ColorStop] = &[
    stop(0.0, 33, 102, 172),
    stop(0.25, 103, 169, 207),
    stop(0.5, 247, 247, 247),
    stop(0.75, 239, 138, 98),
    stop(1.0, 178, 24, 43),
];

const WATER: &[ColorStop] = &[
    stop(0.0, 240, 249, 255),
    stop(0.25, 186, 228, 250),
    stop(0.5, 80, 180, 230),
    stop(0.75, 30, 120, 200),
    stop(1.0, 8, 48, 107),
];

impl ColorScheme {
    pub const ALL: [ColorScheme; 5] = [
        Self::Grayscale,
        Self::RdYlGn,
        Self::Inferno,
        Self::Divergent,
        Self::Water,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Grayscale => "gray",
            Self::RdYlGn => "rdylgn",
            Self::Inferno => "inferno",
            Self::Divergent => "divergent",
            Self::Water => "water",
        }
    }

    pub fn stops(&self) -> &'static [ColorStop] {
        match self {
            Self::Grayscale => GRAYSCALE,
            Self::RdYlGn => RDYLGN,
            Self::Inferno => INFERNO,
            Self::Divergent => DIVERGENT,
            Self::Water => WATER,
        }
    }

    /// Color at `t` in [0, 1]. Values outside the range (and NaN) take the
    /// nearest end color.
    pub fn color_at(&self, t: f64) -> Rgb {
        let stops = self.stops();
        let (first, last) = (stops[0], stops[stops.len() - 1]);
        if !(t > first.t) {
            return first.color;
        }
        stops
            .windows(2)
            .find(|w| t <= w[1].t)
            .map_or(last.color, |w| {
                let local = (t - w[0].t) / (w[1].t - w[0].t);
                w[0].color.blend(w[1].color, local)
            })
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScheme {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grey" | "grayscale" | "greyscale" => Ok(Self::Grayscale),
            name => Self::ALL
                .into_iter()
                .find(|c| c.name() == name)
                .ok_or_else(|| PlotError::UnknownScheme(s.to_string())),
        }
    }
}
