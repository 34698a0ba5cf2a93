/*!
Phase-shifter control word encoding.

Each phase shifter takes a 6 bit code loaded through a shift register. The
shift register outputs are not wired LSB to MSB, so the quantized code has to
be scattered onto the physical pin positions before it is sent, and the
reference pin (bit 5) must always be driven high.
*/

use num_traits::ToPrimitive;

/// Largest phase shift in degrees the shifters can produce
pub const MAX_PS_DEG_VAL: f64 = 353.0;

/// Largest 6 bit control code
pub const MAX_PS_BIT_VAL: u8 = 63;

/// Output pin for each logical bit of the quantized code.
///
/// Bit 0 of the output is Q_H (pin 7) on the shift register, bit 6 is Q_B (pin 1).
pub const PS_BIT_MAP: [u8; 6] = [2, 6, 3, 4, 0, 1];

/// Reference pin, Q_C (pin 2). Always set.
pub const PS_REF_BIT: u8 = 5;

/// Degrees per control code step (about 5.6 degrees)
pub const PS_RESOLUTION_DEG: f64 = MAX_PS_DEG_VAL / MAX_PS_BIT_VAL as f64;

/// Whether `degrees` is a phase the shifters can be commanded to
pub fn is_valid_degrees(degrees: f64) -> bool {
    (0.0..=MAX_PS_DEG_VAL).contains(&degrees)
}

/// Quantize a phase in degrees to the nearest 6 bit code.
///
/// Ties round half to even, so e.g. a value exactly halfway between codes 0
/// and 1 becomes 0. Input outside `[0, 353]` is clamped; NaN maps to code 0.
pub fn quantize(degrees: f64) -> u8 {
    let degrees = num_traits::clamp(degrees, 0.0, MAX_PS_DEG_VAL);
    (degrees / MAX_PS_DEG_VAL * MAX_PS_BIT_VAL as f64)
        .round_ties_even()
        .to_u8()
        .unwrap_or(0)
}

/// Scatter a 6 bit code onto the shift register pins and set the reference bit
pub fn map_to_pins(code: u8) -> u8 {
    let mapped = PS_BIT_MAP
        .iter()
        .enumerate()
        .filter(|(bit, _)| code & (1 << bit) != 0)
        .fold(0u8, |acc, (_, &pin)| acc | (1 << pin));

    mapped | (1 << PS_REF_BIT)
}

/// Convert a validated phase in degrees to the control word sent to one shifter
pub fn quantize_and_map(degrees: f64) -> u8 {
    map_to_pins(quantize(degrees))
}

/// Phase in degrees that a quantized code actually produces
pub fn code_to_degrees(code: u8) -> f64 {
    code.min(MAX_PS_BIT_VAL) as f64 * PS_RESOLUTION_DEG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sets_only_reference_bit() {
        assert_eq!(quantize_and_map(0.0), 1 << PS_REF_BIT);
    }

    #[test]
    fn test_full_scale_sets_every_mapped_pin() {
        assert_eq!(quantize(353.0), 63);
        // pins {2,6,3,4,0,1} plus the reference bit 5
        assert_eq!(quantize_and_map(353.0), 0b0111_1111);
    }

    #[test]
    fn test_reference_bit_always_set() {
        let mut degrees = 0.0;
        while degrees <= MAX_PS_DEG_VAL {
            let word = quantize_and_map(degrees);
            assert_ne!(word & (1 << PS_REF_BIT), 0, "reference bit missing at {degrees}");
            assert_eq!(word & 0x80, 0, "bit 7 set at {degrees}");
            degrees += 0.25;
        }
    }

    #[test]
    fn test_single_bits_land_on_mapped_pins() {
        for (bit, &pin) in PS_BIT_MAP.iter().enumerate() {
            assert_eq!(map_to_pins(1 << bit), (1 << pin) | (1 << PS_REF_BIT));
        }
    }

    #[test]
    fn test_quantize_steps() {
        assert_eq!(quantize(2.0), 0);
        assert_eq!(quantize(5.6), 1);
        assert_eq!(quantize(10.0), 2);
        assert_eq!(quantize(20.0), 4);
        assert_eq!(quantize(30.0), 5);
        assert_eq!(quantize(40.0), 7);
        assert_eq!(quantize(180.0), 32);
    }

    #[test]
    fn test_quantize_ties_go_to_even_code() {
        let tie = |steps: f64| MAX_PS_DEG_VAL * steps / MAX_PS_BIT_VAL as f64;
        assert_eq!(quantize(tie(0.5)), 0);
        assert_eq!(quantize(tie(2.5)), 2);
        assert_eq!(quantize(tie(3.5)), 4);
        assert_eq!(quantize(tie(5.5)), 6);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(quantize(-10.0), 0);
        assert_eq!(quantize(400.0), MAX_PS_BIT_VAL);
        assert_eq!(quantize(f64::NAN), 0);
    }

    #[test]
    fn test_valid_degrees() {
        assert!(is_valid_degrees(0.0));
        assert!(is_valid_degrees(353.0));
        assert!(!is_valid_degrees(353.1));
        assert!(!is_valid_degrees(-0.1));
        assert!(!is_valid_degrees(f64::NAN));
    }

    #[test]
    fn test_code_to_degrees() {
        assert_eq!(code_to_degrees(0), 0.0);
        assert!((code_to_degrees(63) - MAX_PS_DEG_VAL).abs() < 1e-9);
    }
}
