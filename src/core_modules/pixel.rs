// THEORY:
// The `Pixel` module is the most fundamental unit of the fire heuristic. It is a
// "dumb" data container for a single RGB pixel plus the one transform the color
// heuristic needs: a conversion into the 8-bit hue/saturation/value space used by
// the rest of the system.
//
// The HSV encoding follows the common 8-bit camera convention:
// - Hue is the color-wheel angle halved so that it fits a byte: 0..=179.
// - Saturation is chroma relative to value, scaled to 0..=255.
// - Value is the brightest channel, 0..=255.
//
// Fire bands are published in exactly this scale, so the conversion here must round
// the same way the bands were measured: fixed-point division through 12-bit
// reciprocal tables, rounded half up on the scaled result. A negative red-sector
// angle wraps into the high-red end (150..=179).
//
// Key principles:
// 1) Single-pixel scope: nothing here reads neighbors or history.
// 2) Integer-in, integer-out: the heuristic compares bytes, so so do we.

pub mod pixel {
    pub type Channel = u8;
    pub type Hue = u8;
    pub type Saturation = u8;
    pub type Value = u8;

    pub const CHANNELS: usize = 3;

    /// Highest hue representable in the halved-degree scale.
    pub const HUE_MAX: Hue = 179;

    /// A "dumb" data container representing a single RGB pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
    }

    /// A pixel expressed in 8-bit HSV (H 0..=179, S 0..=255, V 0..=255).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Hsv {
        pub hue: Hue,
        pub saturation: Saturation,
        pub value: Value,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
            Pixel { red, green, blue }
        }

        /// HSV Value: the brightest channel.
        pub fn value(&self) -> Value {
            self.red.max(self.green.max(self.blue))
        }

        /// Chroma: max(R,G,B) - min(R,G,B). Zero for any gray.
        pub fn chroma(&self) -> Channel {
            self.value() - self.red.min(self.green.min(self.blue))
        }

        /// Converts to 8-bit HSV.
        ///
        /// - Gray pixels (zero chroma) report hue 0 and saturation 0.
        /// - Black reports saturation 0 rather than dividing by zero.
        pub fn to_hsv(&self) -> Hsv {
            let value = self.value();
            let chroma = self.chroma() as i32;
            let (red, green, blue) = (self.red as i32, self.green as i32, self.blue as i32);

            let saturation = fixed_point_round(chroma * SATURATION_DIVISORS[value as usize]);

            // Sector offsets are expressed in sixths of the wheel, times chroma.
            let sector_difference = if value as i32 == red {
                green - blue
            } else if value as i32 == green {
                blue - red + 2 * chroma
            } else {
                red - green + 4 * chroma
            };

            let mut hue = fixed_point_round(sector_difference * HUE_DIVISORS[chroma as usize]);
            if hue < 0 {
                hue += HUE_MAX as i32 + 1;
            }

            Hsv {
                hue: hue as Hue,
                saturation: saturation as Saturation,
                value,
            }
        }
    }

    /// Fractional bits of the fixed-point divisor tables.
    const SHIFT: u32 = 12;

    /// `round((255 << SHIFT) / v)`, with zero for `v == 0`.
    const SATURATION_DIVISORS: [i32; 256] = divisor_table(255 << SHIFT, 1);

    /// `round((180 << SHIFT) / (6 * c))`, with zero for `c == 0`.
    const HUE_DIVISORS: [i32; 256] = divisor_table(180 << SHIFT, 6);

    /// Rounded integer quotients `numerator / (scale * i)`. No entry sits exactly on
    /// a half, so integer rounding matches floating-point rounding.
    const fn divisor_table(numerator: i32, scale: i32) -> [i32; 256] {
        let mut table = [0i32; 256];
        let mut i = 1;
        while i < 256 {
            let divisor = scale * i as i32;
            table[i] = (2 * numerator + divisor) / (2 * divisor);
            i += 1;
        }
        table
    }

    /// Drops the fraction bits, rounding half up. Negative values floor.
    #[inline]
    fn fixed_point_round(scaled: i32) -> i32 {
        (scaled + (1 << (SHIFT - 1))) >> SHIFT
    }

    impl From<[Channel; CHANNELS]> for Pixel {
        fn from(bytes: [Channel; CHANNELS]) -> Self {
            Pixel::new(bytes[0], bytes[1], bytes[2])
        }
    }

    impl From<&image::Rgb<u8>> for Pixel {
        fn from(rgb: &image::Rgb<u8>) -> Self {
            Pixel::from(rgb.0)
        }
    }

    impl From<Pixel> for image::Rgb<u8> {
        fn from(pixel: Pixel) -> Self {
            image::Rgb([pixel.red, pixel.green, pixel.blue])
        }
    }
}
