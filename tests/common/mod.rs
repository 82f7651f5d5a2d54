#![allow(dead_code)]

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

/// Seeded generator so every run sees the same noise.
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Uniform noise in [-0.5, 0.5).
pub fn noise(rng: &mut StdRng) -> f64 {
    rng.gen_range(-0.5..0.5)
}

pub const PREDICTORS: [&str; 4] = [
    "Inflation (%)",
    "Interest Rate (%)",
    "M2 (Billion USD)",
    "Gold Price",
];

/// Four loosely related macro series of length `n`.
pub fn macro_predictors(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = seeded(seed);
    let mut x = Array2::zeros((n, 4));
    for i in 0..n {
        let t = i as f64;
        x[[i, 0]] = 2.0 + 3.0 * (t / 5.0).sin() + noise(&mut rng);
        x[[i, 1]] = 0.5 + 0.1 * t + 0.4 * noise(&mut rng);
        x[[i, 2]] = 21.0 + 0.05 * t + 2.0 * noise(&mut rng);
        x[[i, 3]] = 18.0 + 0.3 * (t / 3.0).cos() + noise(&mut rng);
    }
    x
}

pub fn month(i: usize) -> String {
    format!("{}-{:02}-01", 2020 + i / 12, i % 12 + 1)
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Predictor table with a `Date` column of month starts.
pub fn predictor_csv(x: &Array2<f64>) -> String {
    let mut out = format!("Date,{}\n", PREDICTORS.join(","));
    for (i, row) in x.rows().into_iter().enumerate() {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&format!("{},{}\n", month(i), values.join(",")));
    }
    out
}

/// Response table with a `Date` column, rows listed in `order`.
pub fn response_csv(y: &Array1<f64>, order: &[usize]) -> String {
    let mut out = String::from("Date,Zmiana_cen_kryptowalut\n");
    for &i in order {
        out.push_str(&format!("{},{}\n", month(i), y[i]));
    }
    out
}
