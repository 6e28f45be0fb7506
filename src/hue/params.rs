use std::f64::consts::PI;

use tracing::{debug, info, warn};

use crate::error::{ConfigError, RuntimeWarning};
use crate::expr::Expr;
use crate::hue::options::{HueExprText, HueOptions, SAT_DEFAULT_VAL, SAT_MAX_VAL, SAT_MIN_VAL};
use crate::hue::vars::{Var, VariableContext, VAR_NAMES};

/// Fixed-point scale of the rotation coefficients (16 fractional bits)
pub const COEFF_ONE: i32 = 1 << 16;

/// Rotation of the (U,V) vector in 16.16 fixed point, pre-scaled by the
/// saturation factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCoefficients {
    pub cos_scaled: i32,
    pub sin_scaled: i32,
}

impl RotationCoefficients {
    /// Hue 0, saturation 1
    pub const IDENTITY: Self = Self {
        cos_scaled: COEFF_ONE,
        sin_scaled: 0,
    };

    /// Scale the unit rotation by `saturation`, the norm of the resulting
    /// (U,V) vector. Rounds half away from zero.
    pub fn from_hue(hue_radians: f32, saturation: f32) -> Self {
        let hue = f64::from(hue_radians);
        let scale = f64::from(COEFF_ONE) * f64::from(saturation);

        Self {
            cos_scaled: (hue.cos() * scale).round() as i32,
            sin_scaled: (hue.sin() * scale).round() as i32,
        }
    }
}

impl Default for RotationCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Current hue and saturation values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueParameters {
    pub hue_radians: f32,
    pub hue_degrees: f32,
    pub saturation: f32,
}

impl HueParameters {
    fn from_degrees(hue_degrees: f32, saturation: f32) -> Self {
        Self {
            hue_radians: degrees_to_radians(hue_degrees),
            hue_degrees,
            saturation,
        }
    }
}

impl Default for HueParameters {
    fn default() -> Self {
        Self::from_degrees(0.0, SAT_DEFAULT_VAL)
    }
}

fn degrees_to_radians(degrees: f32) -> f32 {
    (f64::from(degrees) * PI / 180.0) as f32
}

fn radians_to_degrees(radians: f32) -> f32 {
    (f64::from(radians) * 180.0 / PI) as f32
}

/// Where the saturation comes from.
///
/// `Constant` uses the last value held in [`HueParameters`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSource {
    Constant,
    Expression(Expr),
}

/// Where the hue comes from. Degrees and radians expressions exclude each
/// other by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum HueSource {
    Constant,
    Degrees(Expr),
    Radians(Expr),
}

impl HueSource {
    fn expression(&self) -> Option<&Expr> {
        match self {
            Self::Constant => None,
            Self::Degrees(expr) | Self::Radians(expr) => Some(expr),
        }
    }
}

/// Complete resolver state, swapped in as a unit on reconfiguration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverState {
    params: HueParameters,
    hue: HueSource,
    saturation: ParameterSource,
    coefficients: RotationCoefficients,
}

impl ResolverState {
    fn new(params: HueParameters, hue: HueSource, saturation: ParameterSource) -> Self {
        Self {
            coefficients: RotationCoefficients::from_hue(params.hue_radians, params.saturation),
            params,
            hue,
            saturation,
        }
    }
}

impl Default for ResolverState {
    fn default() -> Self {
        Self::new(
            HueParameters::default(),
            HueSource::Constant,
            ParameterSource::Constant,
        )
    }
}

/// A configuration change staged against the current resolver state.
///
/// Nothing is visible to the resolver until [`PendingUpdate::compile_pending`]
/// has succeeded and the resulting state is swapped in.
#[derive(Debug)]
pub struct PendingUpdate {
    base: ResolverState,
    hue_text: Option<HueExprText>,
    saturation_text: Option<String>,
}

impl PendingUpdate {
    fn stage(current: &ResolverState, options: HueOptions) -> Self {
        match options {
            HueOptions::Static {
                hue_degrees,
                saturation,
            } => Self {
                base: ResolverState::new(
                    HueParameters::from_degrees(hue_degrees, saturation),
                    HueSource::Constant,
                    ParameterSource::Constant,
                ),
                hue_text: None,
                saturation_text: None,
            },
            HueOptions::Dynamic { hue, saturation } => Self {
                base: current.clone(),
                hue_text: hue,
                saturation_text: saturation,
            },
        }
    }

    /// Compile every expression carried as text. The first failure discards
    /// the whole update.
    pub fn compile_pending(self) -> Result<ResolverState, ConfigError> {
        let mut state = self.base;

        if let Some(text) = self.hue_text {
            state.hue = match text {
                HueExprText::Degrees(text) => HueSource::Degrees(compile("h", &text)?),
                HueExprText::Radians(text) => HueSource::Radians(compile("H", &text)?),
            };
        }

        if let Some(text) = self.saturation_text {
            state.saturation = ParameterSource::Expression(compile("s", &text)?);
        }

        state.coefficients =
            RotationCoefficients::from_hue(state.params.hue_radians, state.params.saturation);
        Ok(state)
    }
}

fn compile(name: &str, text: &str) -> Result<Expr, ConfigError> {
    Expr::compile(text, &VAR_NAMES).map_err(|source| ConfigError::ExpressionCompile {
        name: name.to_string(),
        expr: text.to_string(),
        source,
    })
}

/// Owns the authoritative hue/saturation state and turns it into rotation
/// coefficients for each frame.
#[derive(Debug, Clone, Default)]
pub struct ParameterResolver {
    state: ResolverState,
    warnings: Vec<RuntimeWarning>,
}

impl ParameterResolver {
    /// Resolver with hue 0 and saturation 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver configured from option text
    pub fn from_options(text: &str) -> Result<Self, ConfigError> {
        let mut resolver = Self::new();
        resolver.configure(text)?;
        Ok(resolver)
    }

    /// Parse and apply option text. On error the previous state is untouched.
    pub fn configure(&mut self, text: &str) -> Result<(), ConfigError> {
        let options = HueOptions::parse(text)?;
        self.apply(options)
    }

    /// Apply already parsed options transactionally.
    pub fn apply(&mut self, options: HueOptions) -> Result<(), ConfigError> {
        let state = PendingUpdate::stage(&self.state, options).compile_pending()?;
        self.state = state;

        info!(
            "H:{:.1} h:{:.1} s:{:.1} H_expr:{:?} s_expr:{:?}",
            self.state.params.hue_radians,
            self.state.params.hue_degrees,
            self.state.params.saturation,
            self.hue_expression(),
            self.saturation_expression()
        );
        Ok(())
    }

    /// True when any parameter is re-evaluated per frame
    pub fn is_dynamic(&self) -> bool {
        self.state.hue != HueSource::Constant || self.state.saturation != ParameterSource::Constant
    }

    pub fn parameters(&self) -> HueParameters {
        self.state.params
    }

    /// Coefficients of the most recent resolution or configuration
    pub fn coefficients(&self) -> RotationCoefficients {
        self.state.coefficients
    }

    pub fn hue_source(&self) -> &HueSource {
        &self.state.hue
    }

    pub fn saturation_source(&self) -> &ParameterSource {
        &self.state.saturation
    }

    pub fn hue_expression(&self) -> Option<&str> {
        self.state.hue.expression().map(Expr::text)
    }

    pub fn saturation_expression(&self) -> Option<&str> {
        match &self.state.saturation {
            ParameterSource::Constant => None,
            ParameterSource::Expression(expr) => Some(expr.text()),
        }
    }

    /// Notices raised by the last call to [`resolve_for_frame`](Self::resolve_for_frame)
    pub fn warnings(&self) -> &[RuntimeWarning] {
        &self.warnings
    }

    /// Produce the coefficients for the frame described by `vars`, then count
    /// the frame in `vars`.
    ///
    /// Saturation is evaluated before hue and clamped into
    /// `[SAT_MIN_VAL, SAT_MAX_VAL]`. A hue that is not finite once narrowed to
    /// `f32`, and a NaN saturation, keep the previous value.
    pub fn resolve_for_frame(&mut self, vars: &mut VariableContext) -> RotationCoefficients {
        self.warnings.clear();

        if self.is_dynamic() {
            self.evaluate(vars);
        }

        vars.advance();
        self.state.coefficients
    }

    fn evaluate(&mut self, vars: &VariableContext) {
        let values = vars.as_slice();
        let params = &mut self.state.params;

        if let ParameterSource::Expression(expr) = &self.state.saturation {
            let value = expr.eval(values);

            if value.is_nan() {
                let warning = RuntimeWarning::NonFiniteValue {
                    name: "s",
                    kept: params.saturation,
                };
                warn!("{}", warning);
                self.warnings.push(warning);
            } else if value < f64::from(SAT_MIN_VAL) || value > f64::from(SAT_MAX_VAL) {
                params.saturation =
                    value.clamp(f64::from(SAT_MIN_VAL), f64::from(SAT_MAX_VAL)) as f32;
                let warning = RuntimeWarning::SaturationClamped {
                    value,
                    clamped: params.saturation,
                    min: SAT_MIN_VAL,
                    max: SAT_MAX_VAL,
                };
                warn!("{}", warning);
                self.warnings.push(warning);
            } else {
                params.saturation = value as f32;
            }
        }

        match &self.state.hue {
            HueSource::Degrees(expr) => {
                let degrees = expr.eval(values) as f32;
                let radians = degrees_to_radians(degrees);
                if degrees.is_finite() && radians.is_finite() {
                    params.hue_degrees = degrees;
                    params.hue_radians = radians;
                } else {
                    let warning = RuntimeWarning::NonFiniteValue {
                        name: "h",
                        kept: params.hue_degrees,
                    };
                    warn!("{}", warning);
                    self.warnings.push(warning);
                }
            }
            HueSource::Radians(expr) => {
                let radians = expr.eval(values) as f32;
                let degrees = radians_to_degrees(radians);
                if radians.is_finite() && degrees.is_finite() {
                    params.hue_radians = radians;
                    params.hue_degrees = degrees;
                } else {
                    let warning = RuntimeWarning::NonFiniteValue {
                        name: "H",
                        kept: params.hue_radians,
                    };
                    warn!("{}", warning);
                    self.warnings.push(warning);
                }
            }
            HueSource::Constant => {}
        }

        debug!(
            "H:{:.1} s:{:.1} t:{:.1} n:{}",
            params.hue_radians,
            params.saturation,
            vars.get(Var::T),
            vars.frame_count()
        );

        self.state.coefficients =
            RotationCoefficients::from_hue(params.hue_radians, params.saturation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::Rational;

    fn vars() -> VariableContext {
        VariableContext::new(Rational::new(1, 25), Rational::new(25, 1))
    }

    #[test]
    fn test_default_is_identity() {
        let mut resolver = ParameterResolver::new();
        assert!(!resolver.is_dynamic());
        assert_eq!(
            resolver.resolve_for_frame(&mut vars()),
            RotationCoefficients::IDENTITY
        );
    }

    #[test]
    fn test_static_180_inverts() {
        let mut resolver = ParameterResolver::from_options("180:1").unwrap();
        let coeffs = resolver.resolve_for_frame(&mut vars());
        assert_eq!(coeffs.cos_scaled, -65536);
        assert_eq!(coeffs.sin_scaled, 0);
    }

    #[test]
    fn test_static_saturation_scales_coefficients() {
        let resolver = ParameterResolver::from_options("90:2").unwrap();
        let coeffs = resolver.coefficients();
        assert_eq!(coeffs.cos_scaled, 0);
        assert_eq!(coeffs.sin_scaled, 131072);

        let resolver = ParameterResolver::from_options("0:0").unwrap();
        assert_eq!(
            resolver.coefficients(),
            RotationCoefficients {
                cos_scaled: 0,
                sin_scaled: 0
            }
        );
    }

    #[test]
    fn test_coefficients_round_half_away_from_zero() {
        // 0.5 / 65536 and its negation land exactly on the half
        let half = 0.5 / 65536.0;
        let coeffs = RotationCoefficients::from_hue(0.0, half);
        assert_eq!(coeffs.cos_scaled, 1);
        let coeffs = RotationCoefficients::from_hue(0.0, -half);
        assert_eq!(coeffs.cos_scaled, -1);
    }

    #[test]
    fn test_counter_advances_once_per_frame() {
        let mut resolver = ParameterResolver::from_options("h=n*10").unwrap();
        let mut vars = vars();

        resolver.resolve_for_frame(&mut vars);
        assert_eq!(resolver.parameters().hue_degrees, 0.0);
        assert_eq!(vars.frame_count(), 1);

        resolver.resolve_for_frame(&mut vars);
        assert_eq!(resolver.parameters().hue_degrees, 10.0);
        assert_eq!(vars.frame_count(), 2);
    }

    #[test]
    fn test_static_mode_skips_evaluation_but_counts() {
        let mut resolver = ParameterResolver::from_options("45").unwrap();
        let mut vars = vars();
        let before = resolver.coefficients();
        resolver.resolve_for_frame(&mut vars);
        resolver.resolve_for_frame(&mut vars);
        assert_eq!(resolver.coefficients(), before);
        assert_eq!(vars.frame_count(), 2);
    }

    #[test]
    fn test_radians_expression() {
        let mut resolver = ParameterResolver::from_options("H=PI/2").unwrap();
        let coeffs = resolver.resolve_for_frame(&mut vars());
        assert_eq!(coeffs.cos_scaled, 0);
        assert_eq!(coeffs.sin_scaled, 65536);
        assert!((resolver.parameters().hue_degrees - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_time_driven_hue() {
        let mut resolver = ParameterResolver::from_options("h=90*t").unwrap();
        let mut vars = vars();
        vars.set_timestamp(Some(50));
        let coeffs = resolver.resolve_for_frame(&mut vars);
        // t = 2s -> 180 degrees
        assert_eq!(coeffs.cos_scaled, -65536);
        assert_eq!(resolver.parameters().hue_degrees, 180.0);
    }

    #[test]
    fn test_dynamic_saturation_is_clamped_with_warning() {
        let mut resolver = ParameterResolver::from_options("s=12").unwrap();
        let coeffs = resolver.resolve_for_frame(&mut vars());
        assert_eq!(resolver.parameters().saturation, 10.0);
        assert_eq!(coeffs.cos_scaled, 655360);
        assert!(matches!(
            resolver.warnings(),
            [RuntimeWarning::SaturationClamped { clamped, .. }] if *clamped == 10.0
        ));

        resolver.configure("s=-1e9").unwrap();
        resolver.resolve_for_frame(&mut vars());
        assert_eq!(resolver.parameters().saturation, -10.0);

        resolver.configure("s=1").unwrap();
        resolver.resolve_for_frame(&mut vars());
        assert!(resolver.warnings().is_empty());
    }

    #[test]
    fn test_nan_values_keep_previous() {
        let mut resolver = ParameterResolver::from_options("h=t:s=t").unwrap();
        resolver.configure("30:0.5").unwrap();
        resolver.configure("h=t:s=t").unwrap();

        // No timestamp: t is NaN
        let coeffs = resolver.resolve_for_frame(&mut vars());
        assert_eq!(resolver.parameters().saturation, 0.5);
        assert_eq!(resolver.parameters().hue_degrees, 30.0);
        assert_eq!(coeffs, RotationCoefficients::from_hue(degrees_to_radians(30.0), 0.5));
        assert_eq!(resolver.warnings().len(), 2);
    }

    #[test]
    fn test_hue_overflowing_f32_keeps_previous() {
        let previous = RotationCoefficients::from_hue(degrees_to_radians(30.0), 1.0);

        for options in ["H=1e39", "h=1e39", "H=3e38"] {
            let mut resolver = ParameterResolver::from_options("30:1").unwrap();
            resolver.configure(options).unwrap();

            let coeffs = resolver.resolve_for_frame(&mut vars());
            assert_eq!(coeffs, previous, "{options}");
            assert_eq!(resolver.parameters().hue_degrees, 30.0);
            assert!(matches!(
                resolver.warnings(),
                [RuntimeWarning::NonFiniteValue { .. }]
            ));
        }
    }

    #[test]
    fn test_partial_update_keeps_hue_source() {
        let mut resolver = ParameterResolver::from_options("h=n:s=2").unwrap();
        resolver.configure("s=3").unwrap();
        assert_eq!(resolver.hue_expression(), Some("n"));
        assert_eq!(resolver.saturation_expression(), Some("3"));

        resolver.configure("H=1").unwrap();
        assert!(matches!(resolver.hue_source(), HueSource::Radians(_)));
        assert_eq!(resolver.saturation_expression(), Some("3"));
    }

    #[test]
    fn test_partial_update_keeps_constant_hue() {
        let mut resolver = ParameterResolver::from_options("60:1").unwrap();
        resolver.configure("s=0.5").unwrap();
        let coeffs = resolver.resolve_for_frame(&mut vars());
        assert_eq!(resolver.parameters().hue_degrees, 60.0);
        assert_eq!(coeffs, RotationCoefficients::from_hue(degrees_to_radians(60.0), 0.5));
    }

    #[test]
    fn test_compat_form_returns_to_static() {
        let mut resolver = ParameterResolver::from_options("h=n:s=2").unwrap();
        assert!(resolver.is_dynamic());
        resolver.configure("10:1").unwrap();
        assert!(!resolver.is_dynamic());
        assert_eq!(resolver.hue_expression(), None);
        assert_eq!(resolver.saturation_expression(), None);
    }

    #[test]
    fn test_failed_compile_rolls_back() {
        let mut resolver = ParameterResolver::from_options("h=n*2:s=1.5").unwrap();
        resolver.resolve_for_frame(&mut vars());
        let before = resolver.clone();

        let err = resolver.configure("h=n*3:s=1+*").unwrap_err();
        assert!(matches!(err, ConfigError::ExpressionCompile { ref name, .. } if name == "s"));
        assert_eq!(resolver.state, before.state);
        assert_eq!(resolver.hue_expression(), Some("n*2"));
        assert_eq!(resolver.saturation_expression(), Some("1.5"));
    }

    #[test]
    fn test_incompatible_options_change_nothing() {
        let mut resolver = ParameterResolver::from_options("h=n").unwrap();
        let before = resolver.state.clone();
        assert!(matches!(
            resolver.configure("h=1:H=2"),
            Err(ConfigError::IncompatibleOptions)
        ));
        assert_eq!(resolver.state, before);
    }

    #[test]
    fn test_out_of_range_compat_changes_nothing() {
        let mut resolver = ParameterResolver::from_options("20:2").unwrap();
        let before = resolver.state.clone();
        assert!(matches!(
            resolver.configure("40:11"),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert_eq!(resolver.state, before);
    }

    #[test]
    fn test_pending_update_is_invisible_until_committed() {
        let resolver = ParameterResolver::from_options("10").unwrap();
        let pending = PendingUpdate::stage(&resolver.state, HueOptions::parse("s=2").unwrap());
        let staged = pending.compile_pending().unwrap();
        assert!(matches!(staged.saturation, ParameterSource::Expression(_)));
        assert_eq!(resolver.saturation_source(), &ParameterSource::Constant);
    }
}
