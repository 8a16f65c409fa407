//! Validation harness: deterministic and random test tensors, the scalar
//! golden reference, and element-wise comparison of engine output.

use std::fmt;

use qconv_scalar_ops::conv::{scalar_conv2d_i8, ScalarConvDims};
use qconv_scalar_ops::requant::SCALAR_REQUANT_SHIFT;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::accelerator::{ConvAccelerator, ConvBuffers};
use crate::error::ConvResult;
use crate::tensors::{Activations, BiasVector, ConvWeights};
use crate::types::ConvShape;

/// Bound on random biases. Large enough to move outputs across the whole
/// int8 range, small enough that not every output saturates.
pub const RANDOM_BIAS_BOUND: i32 = 1 << 16;

/// One invocation's worth of inputs.
#[derive(Debug, Clone)]
pub struct ConvTensors {
    pub shape: ConvShape,
    pub input: Activations,
    pub weights: ConvWeights,
    pub bias: BiasVector,
}

impl ConvTensors {
    /// Board bring-up pattern: `in[i] = i%13 - 6`, `w[i] = i%7 - 3`,
    /// `b[i] = i%16`.
    pub fn deterministic(shape: ConvShape) -> Self {
        Self {
            shape,
            input: Activations::input_from_fn(&shape, |i| (i % 13) as i8 - 6),
            weights: ConvWeights::from_fn(&shape, |i| (i % 7) as i8 - 3),
            bias: BiasVector::from_fn(&shape, |i| (i % 16) as i32),
        }
    }

    /// Uniform int8 activations and weights, biases in
    /// `[-RANDOM_BIAS_BOUND, RANDOM_BIAS_BOUND]`.
    pub fn random(shape: ConvShape, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let input = Activations::input_from_fn(&shape, |_| rng.gen::<i8>());
        let weights = ConvWeights::from_fn(&shape, |_| rng.gen::<i8>());
        let bias = BiasVector::from_fn(&shape, |_| {
            rng.gen_range(-RANDOM_BIAS_BOUND..=RANDOM_BIAS_BOUND)
        });
        Self {
            shape,
            input,
            weights,
            bias,
        }
    }
}

/// Output of the scalar golden reference for `tensors`.
pub fn reference_output(tensors: &ConvTensors) -> Activations {
    let shape = &tensors.shape;
    let mut out = Activations::output_for(shape);
    let dims = ScalarConvDims {
        height: shape.height,
        width: shape.width,
        in_channels: shape.in_channels,
        out_channels: shape.out_channels,
        kernel: shape.kernel,
    };
    scalar_conv2d_i8(
        tensors.input.as_slice(),
        tensors.weights.as_slice(),
        tensors.bias.as_slice(),
        out.as_mut_slice(),
        dims,
        SCALAR_REQUANT_SHIFT,
    );
    out
}

/// Run `accelerator` on `tensors` and return its output tensor.
pub fn run_accelerator<A: ConvAccelerator + ?Sized>(
    accelerator: &mut A,
    tensors: &ConvTensors,
) -> ConvResult<Activations> {
    let mut out = Activations::output_for(&tensors.shape);
    accelerator.invoke(ConvBuffers {
        input: tensors.input.as_slice(),
        output: out.as_mut_slice(),
        weights: tensors.weights.as_slice(),
        bias: tensors.bias.as_slice(),
    })?;
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Flat output index.
    pub index: usize,
    pub engine: i8,
    pub reference: i8,
}

impl Mismatch {
    /// `(oy, ox, co)` of this element in an output of `shape`.
    pub fn locate(&self, shape: &ConvShape) -> (usize, usize, usize) {
        let co = self.index % shape.out_channels;
        let pixel = self.index / shape.out_channels;
        (pixel / shape.out_width(), pixel % shape.out_width(), co)
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mismatch at {}: HW={} SW={}",
            self.index, self.engine, self.reference
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MismatchReport {
    /// Elements compared.
    pub compared: usize,
    /// Elements that differ, including any length difference.
    pub total: usize,
    /// The first mismatches in index order, at most `max_reported`.
    pub first: Vec<Mismatch>,
}

impl MismatchReport {
    #[inline]
    pub fn passed(&self) -> bool {
        self.total == 0
    }

    /// Process exit status: 0 iff nothing differs.
    #[inline]
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.first {
            writeln!(f, "{m}")?;
        }
        write!(f, "Total mismatches: {}", self.total)
    }
}

/// Element-wise comparison keeping the first `max_reported` mismatches.
pub fn compare_outputs(engine: &[i8], reference: &[i8], max_reported: usize) -> MismatchReport {
    let mut report = MismatchReport {
        compared: engine.len().min(reference.len()),
        total: engine.len().abs_diff(reference.len()),
        first: Vec::new(),
    };
    for (index, (&e, &r)) in engine.iter().zip(reference).enumerate() {
        if e != r {
            report.total += 1;
            if report.first.len() < max_reported {
                report.first.push(Mismatch {
                    index,
                    engine: e,
                    reference: r,
                });
            }
        }
    }
    report
}

/// Run `accelerator` and the golden reference on `tensors` and compare.
pub fn validate<A: ConvAccelerator + ?Sized>(
    accelerator: &mut A,
    tensors: &ConvTensors,
    max_reported: usize,
) -> ConvResult<MismatchReport> {
    tensors.shape.validate()?;
    let shape = accelerator.shape();
    if shape != tensors.shape {
        return Err(crate::error::ConvError::ShapeMismatch(format!(
            "{} accelerator is {:?}, tensors are {:?}",
            accelerator.name(),
            shape,
            tensors.shape
        )));
    }

    let engine = run_accelerator(accelerator, tensors)?;
    let reference = reference_output(tensors);
    let report = compare_outputs(engine.as_slice(), reference.as_slice(), max_reported);

    if report.passed() {
        log::info!(
            "{}: {} outputs match the reference",
            accelerator.name(),
            report.compared
        );
    } else {
        log::warn!(
            "{}: {} of {} outputs differ from the reference",
            accelerator.name(),
            report.total,
            report.compared
        );
        for m in &report.first {
            let (oy, ox, co) = m.locate(&shape);
            log::warn!("  {} at ({}, {}, {})", m, oy, ox, co);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accelerator::{ControlStatus, SoftwareAccelerator};
    use crate::error::ConvError;
    use crate::types::{EngineConfig, YOLO_LAYER};

    type Small = SoftwareAccelerator<5, 6, 4, 4, 3, 2, 2>;

    #[test]
    fn test_deterministic_pattern() {
        let t = ConvTensors::deterministic(YOLO_LAYER);
        assert_eq!(t.input.as_slice()[..14], [-6, -5, -4, -3, -2, -1, 0, 1, 2, 3, 4, 5, 6, -6]);
        assert_eq!(t.weights.as_slice()[..8], [-3, -2, -1, 0, 1, 2, 3, -3]);
        assert_eq!(t.bias.as_slice()[15..17], [15, 0]);
        assert_eq!(t.input.len(), YOLO_LAYER.input_len());
        assert_eq!(t.weights.len(), YOLO_LAYER.weight_len());
    }

    #[test]
    fn test_random_is_seeded() {
        let shape = Small::new(EngineConfig::default()).shape();
        let a = ConvTensors::random(shape, 7);
        let b = ConvTensors::random(shape, 7);
        let c = ConvTensors::random(shape, 8);
        assert_eq!(a.input, b.input);
        assert_eq!(a.bias, b.bias);
        assert_ne!(a.input, c.input);
        assert!(a
            .bias
            .as_slice()
            .iter()
            .all(|b| b.abs() <= RANDOM_BIAS_BOUND));
    }

    #[test]
    fn test_compare_reports_first_n() {
        let engine = [0i8, 1, 2, 3, 4, 5];
        let reference = [0i8, 9, 2, 9, 9, 9];
        let report = compare_outputs(&engine, &reference, 2);
        assert_eq!(report.compared, 6);
        assert_eq!(report.total, 4);
        assert_eq!(
            report.first,
            vec![
                Mismatch { index: 1, engine: 1, reference: 9 },
                Mismatch { index: 3, engine: 3, reference: 9 },
            ]
        );
        assert!(!report.passed());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.first[0].to_string(), "Mismatch at 1: HW=1 SW=9");
    }

    #[test]
    fn test_compare_counts_length_difference() {
        let report = compare_outputs(&[1, 2, 3], &[1, 2], 10);
        assert_eq!(report.compared, 2);
        assert_eq!(report.total, 1);
        assert!(report.first.is_empty());
    }

    #[test]
    fn test_identical_outputs_pass() {
        let report = compare_outputs(&[5; 16], &[5; 16], 10);
        assert!(report.passed());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.to_string(), "Total mismatches: 0");
    }

    #[test]
    fn test_mismatch_locate() {
        let m = Mismatch { index: (24 + 2) * 128 + 5, engine: 0, reference: 1 };
        assert_eq!(m.locate(&YOLO_LAYER), (1, 2, 5));
    }

    #[test]
    fn test_validate_software_accelerator() {
        let mut acc = Small::new(EngineConfig::default());
        let tensors = ConvTensors::random(acc.shape(), 42);
        let report = validate(&mut acc, &tensors, 10).unwrap();
        assert!(report.passed(), "{report}");
        assert_eq!(report.compared, acc.shape().output_len());
        assert_eq!(acc.status(), ControlStatus::Done);
    }

    #[test]
    fn test_validate_rejects_shape_mismatch() {
        let mut acc = Small::new(EngineConfig::default());
        let tensors = ConvTensors::deterministic(YOLO_LAYER);
        let err = validate(&mut acc, &tensors, 10).unwrap_err();
        assert!(matches!(err, ConvError::ShapeMismatch(_)));
    }
}
