//! Whole-frame similarity between the two sources at one timeline position.

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::compositor::{FramePair, RawFrame};

#[derive(Debug, Clone, Serialize)]
pub struct QualityMetrics {
    pub mse: f64,
    pub psnr: f64,
    pub ssim: f64,
}

pub fn compute_metrics(pair: &FramePair) -> Result<QualityMetrics> {
    ensure_dimensions_match(&pair.a, &pair.b)?;

    let mse = mean_squared_error(pair.a.data(), pair.b.data());
    let psnr = peak_signal_to_noise_ratio(mse);
    let ssim = structural_similarity(&luma(pair.a.data()), &luma(pair.b.data()))?;

    Ok(QualityMetrics { mse, psnr, ssim })
}

fn ensure_dimensions_match(a: &RawFrame, b: &RawFrame) -> Result<()> {
    if a.geometry() != b.geometry() {
        return Err(anyhow!(
            "Cannot compute metrics: dimension mismatch {} vs {}",
            a.geometry(),
            b.geometry()
        ));
    }
    Ok(())
}

fn mean_squared_error(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let total: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let diff = x as f64 - y as f64;
            diff * diff
        })
        .sum();
    total / a.len() as f64
}

fn peak_signal_to_noise_ratio(mse: f64) -> f64 {
    if mse == 0.0 {
        f64::INFINITY
    } else {
        20.0 * ((255.0f64).log10()) - 10.0 * mse.log10()
    }
}

/// BT.601 luma on the 0..=255 scale from BGR24.
fn luma(bgr: &[u8]) -> Vec<f64> {
    bgr.chunks_exact(3)
        .map(|p| 0.114 * p[0] as f64 + 0.587 * p[1] as f64 + 0.299 * p[2] as f64)
        .collect()
}

/// Global (single-window) SSIM.
fn structural_similarity(reference: &[f64], candidate: &[f64]) -> Result<f64> {
    if reference.is_empty() {
        return Err(anyhow!("SSIM needs at least one pixel"));
    }
    let mean_ref = mean(reference);
    let mean_cand = mean(candidate);
    let cov = covariance(reference, candidate, mean_ref, mean_cand);
    let var_ref = covariance(reference, reference, mean_ref, mean_ref);
    let var_cand = covariance(candidate, candidate, mean_cand, mean_cand);

    let c1 = (0.01_f64 * 255.0_f64).powi(2);
    let c2 = (0.03_f64 * 255.0_f64).powi(2);

    let numerator = (2.0 * mean_ref * mean_cand + c1) * (2.0 * cov + c2);
    let denominator = (mean_ref.powi(2) + mean_cand.powi(2) + c1) * (var_ref + var_cand + c2);
    if denominator == 0.0 {
        return Err(anyhow!("SSIM denominator is zero"));
    }

    Ok(numerator / denominator)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn covariance(a: &[f64], b: &[f64], mean_a: f64, mean_b: f64) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / a.len() as f64
}
