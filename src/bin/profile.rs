use ndarray::ArrayD;
use rand_distr::{Distribution, StandardNormal};
use std::time::Instant;
use tilepack::{quantize_image, restore_image, QuantizeParams};

fn main() {
    // Large synthetic noise image, roughly the dynamic range of calibrated
    // interferometric data
    let shape = vec![4096, 2048];
    let data: ArrayD<f32> = ArrayD::from_shape_fn(shape.clone(), |_| {
        let sample: f64 = StandardNormal.sample(&mut rand::rng());
        (sample * 40.0) as f32
    });

    let guard = pprof::ProfilerGuard::new(1000).unwrap();

    let params = QuantizeParams::new(&[256, 256], 0.05);

    let start = Instant::now();
    let quantized = quantize_image(data.view(), &params).unwrap();
    println!("Quantization took {:?}", start.elapsed());

    let start = Instant::now();
    let restored = restore_image(quantized.view(), &params).unwrap();
    println!("Restoration took {:?}", start.elapsed());

    let max_err = data
        .iter()
        .zip(restored.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    println!(
        "Max restoration error: {max_err} (bound {})",
        0.5 * params.scale
    );

    if let Ok(report) = guard.report().build() {
        let file = std::fs::File::create("flamegraph.svg").unwrap();
        report.flamegraph(file).unwrap();
    }
}
