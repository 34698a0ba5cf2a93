/*!
Beam-angle to phase-shift calculation.

The console converts a requested main-beam angle into the progressive phase
shift between adjacent array elements. The conversion sits behind
[`BeamCalculator`] so the antenna model can be swapped without touching
command assembly.
*/

/// One full turn in degrees
pub const FULL_TURN_DEG: f64 = 360.0;

/// Converts a main-beam angle into a phase shift for the array
pub trait BeamCalculator: Send + Sync {
    /// Phase shift in degrees between adjacent elements that points the main
    /// beam at `angle_deg`. `geometry_ratio` is element spacing over wavelength.
    fn phase_shift_for_angle(&self, geometry_ratio: f64, angle_deg: i32) -> f64;

    /// Fold a phase in degrees into the calculator's canonical range
    fn wrap_phase(&self, phase_deg: f64) -> f64;
}

/// Uniform linear array: `phase = 360 * (d / lambda) * sin(angle)`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearArrayCalculator;

impl BeamCalculator for LinearArrayCalculator {
    fn phase_shift_for_angle(&self, geometry_ratio: f64, angle_deg: i32) -> f64 {
        FULL_TURN_DEG * geometry_ratio * (angle_deg as f64).to_radians().sin()
    }

    fn wrap_phase(&self, phase_deg: f64) -> f64 {
        wrap_phase_deg(phase_deg)
    }
}

/// Wrap a phase into `[0, 360)`
pub fn wrap_phase_deg(phase_deg: f64) -> f64 {
    let wrapped = phase_deg.rem_euclid(FULL_TURN_DEG);
    // rem_euclid rounds tiny negative inputs up to exactly 360, and keeps -0.0
    if wrapped >= FULL_TURN_DEG || wrapped == 0.0 {
        0.0
    } else {
        wrapped
    }
}

/// Element spacing over wavelength for an array designed at `frequency_hz`.
///
/// `element_spacing_m` defaults to half a wavelength.
pub fn geometry_ratio(frequency_hz: f64, propagation_speed_m_s: f64, element_spacing_m: Option<f64>) -> Option<f64> {
    if !(frequency_hz > 0.0 && propagation_speed_m_s > 0.0) {
        return None;
    }

    let wavelength_m = propagation_speed_m_s / frequency_hz;
    let spacing_m = element_spacing_m.unwrap_or(wavelength_m / 2.0);
    if !(spacing_m > 0.0) {
        return None;
    }

    Some(spacing_m / wavelength_m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadside_has_no_phase_shift() {
        let calc = LinearArrayCalculator;
        assert_eq!(calc.wrap_phase(calc.phase_shift_for_angle(0.5, 0)), 0.0);
    }

    #[test]
    fn test_phase_for_thirty_degrees() {
        let calc = LinearArrayCalculator;
        let phase = calc.phase_shift_for_angle(0.5, 30);
        assert!((phase - 90.0).abs() < 1e-9, "got {phase}");
    }

    #[test]
    fn test_negative_angle_wraps_positive() {
        let calc = LinearArrayCalculator;
        let phase = calc.wrap_phase(calc.phase_shift_for_angle(0.5, -30));
        assert!((phase - 270.0).abs() < 1e-9, "got {phase}");
    }

    #[test]
    fn test_wrap_phase_range() {
        assert_eq!(wrap_phase_deg(360.0), 0.0);
        assert_eq!(wrap_phase_deg(-0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(wrap_phase_deg(-1e-20), 0.0);
        assert_eq!(wrap_phase_deg(725.0), 5.0);
        assert_eq!(wrap_phase_deg(-90.0), 270.0);
    }

    #[test]
    fn test_half_wavelength_geometry() {
        assert_eq!(geometry_ratio(10e9, 3e8, None), Some(0.5));
        let quarter = geometry_ratio(10e9, 3e8, Some(0.0075)).unwrap();
        assert!((quarter - 0.25).abs() < 1e-9);
        assert_eq!(geometry_ratio(0.0, 3e8, None), None);
        assert_eq!(geometry_ratio(10e9, 3e8, Some(-1.0)), None);
    }
}
