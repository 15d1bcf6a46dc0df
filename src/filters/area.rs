//! Area-based corruption.
//!
//! All filters here share one pattern: corruption seeds are generated
//! by a geometric inter-arrival walk over the flattened index space,
//! each seed splats a radius into a 2-D difference array, and a prefix
//! sum materializes the affected-region field. Expected work stays
//! sub-linear in the seed probability instead of paying O(width *
//! height) per seed.

use ndarray::{Array2, ArrayViewMut3, ArrayViewMutD, Ix2, Ix3};
use rand::Rng;
use rand_distr::{Distribution, Geometric};

use crate::params::ParamMap;
use crate::radius::RadiusGenerator;
use crate::random::{self, SeededRng};
use crate::tree::DimContext;
use crate::{Element, FaultError};

use std::sync::Arc;

use super::Filter;

/// Seed indexes on a flattened grid of `cells` cells, drawn with
/// geometric inter-arrival at the given per-cell probability.
pub(crate) fn corruption_seeds(
    rng: &mut SeededRng,
    probability: f64,
    cells: usize,
) -> Result<Vec<usize>, FaultError> {
    if probability <= 0.0 || cells == 0 {
        return Ok(Vec::new());
    }

    let geometric = Geometric::new(probability).map_err(|_| {
        FaultError::InvalidConfig(format!("seed probability {probability} outside (0, 1]"))
    })?;

    let mut seeds = Vec::new();
    let mut index: i128 = -1;
    loop {
        // rand_distr counts failures; the inter-arrival step counts trials.
        index += geometric.sample(rng) as i128 + 1;
        if index >= cells as i128 {
            break;
        }
        seeds.push(index as usize);
    }
    Ok(seeds)
}

/// Adds one clipped rectangle around (x, y) into the difference array.
fn splat_rect(
    errs: &mut Array2<f64>,
    x: usize,
    y: usize,
    x_radius: usize,
    y_radius: usize,
    width: usize,
    height: usize,
) {
    let x0 = x.saturating_sub(x_radius);
    let x1 = (x + x_radius + 1).min(width);
    let y0 = y.saturating_sub(y_radius);
    let y1 = (y + y_radius + 1).min(height);
    errs[[y0, x0]] += 1.0;
    errs[[y0, x1]] -= 1.0;
    errs[[y1, x0]] -= 1.0;
    errs[[y1, x1]] += 1.0;
}

/// 2-D prefix sum, rows then columns.
fn prefix_sum(errs: &mut Array2<f64>) {
    let (rows, cols) = errs.dim();
    for y in 1..rows {
        for x in 0..cols {
            let above = errs[[y - 1, x]];
            errs[[y, x]] += above;
        }
    }
    for y in 0..rows {
        for x in 1..cols {
            let left = errs[[y, x - 1]];
            errs[[y, x]] += left;
        }
    }
}

fn as_image<'a, T: Element>(
    data: ArrayViewMutD<'a, T>,
    context: &'static str,
) -> Result<ArrayViewMut3<'a, T>, FaultError> {
    let shape = data.shape().to_vec();
    data.into_dimensionality::<Ix3>()
        .map_err(|_| FaultError::ShapeMismatch {
            context,
            expected: "3-D tensor (height, width, channels)".to_string(),
            got: format!("{shape:?}"),
        })
}

/// Stochastic rectangular blackouts: splatted cells are overwritten
/// with the missing value.
pub struct MissingArea {
    probability_key: String,
    radius_key: String,
    missing_value_key: String,
    probability: f64,
    radius: Option<Arc<dyn RadiusGenerator>>,
    missing_value: f64,
}

impl MissingArea {
    pub fn new(
        probability_key: impl Into<String>,
        radius_key: impl Into<String>,
        missing_value_key: impl Into<String>,
    ) -> Self {
        Self {
            probability_key: probability_key.into(),
            radius_key: radius_key.into(),
            missing_value_key: missing_value_key.into(),
            probability: 0.0,
            radius: None,
            missing_value: 0.0,
        }
    }
}

impl<T: Element> Filter<T> for MissingArea {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.probability = params.f64(&self.probability_key)?;
        self.radius = Some(params.radius(&self.radius_key)?);
        self.missing_value = params.f64(&self.missing_value_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let shape = data.shape().to_vec();
        let mut view = data
            .into_dimensionality::<Ix2>()
            .map_err(|_| FaultError::ShapeMismatch {
                context: "missing area",
                expected: "2-D tensor".to_string(),
                got: format!("{shape:?}"),
            })?;
        let (height, width) = view.dim();

        let radius = self
            .radius
            .as_ref()
            .ok_or_else(|| FaultError::MissingParameter {
                key: self.radius_key.clone(),
            })?;

        let seeds = corruption_seeds(rng, self.probability, width * height)?;
        if seeds.is_empty() {
            return Ok(());
        }

        let mut errs = Array2::zeros((height + 1, width + 1));
        for seed in seeds {
            let y = seed / width;
            let x = seed % width;
            let r = radius.generate(rng);
            splat_rect(&mut errs, x, y, r, r, width, height);
        }
        prefix_sum(&mut errs);

        let missing = T::from_f64(self.missing_value);
        for y in 0..height {
            for x in 0..width {
                if errs[[y, x]] > 0.0 {
                    view[[y, x]] = missing;
                }
            }
        }
        Ok(())
    }
}

/// Dark stains on an image: every channel of a stained pixel is
/// multiplied by `transparency ^ stain_count`.
pub struct StainArea {
    probability_key: String,
    radius_key: String,
    transparency_key: String,
    probability: f64,
    radius: Option<Arc<dyn RadiusGenerator>>,
    transparency: f64,
}

impl StainArea {
    pub fn new(
        probability_key: impl Into<String>,
        radius_key: impl Into<String>,
        transparency_key: impl Into<String>,
    ) -> Self {
        Self {
            probability_key: probability_key.into(),
            radius_key: radius_key.into(),
            transparency_key: transparency_key.into(),
            probability: 0.0,
            radius: None,
            transparency: 1.0,
        }
    }
}

impl<T: Element> Filter<T> for StainArea {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.probability = params.f64(&self.probability_key)?;
        self.radius = Some(params.radius(&self.radius_key)?);
        self.transparency = params.f64(&self.transparency_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let mut view = as_image(data, "stain area")?;
        let (height, width, channels) = view.dim();

        let radius = self
            .radius
            .as_ref()
            .ok_or_else(|| FaultError::MissingParameter {
                key: self.radius_key.clone(),
            })?;

        let seeds = corruption_seeds(rng, self.probability, width * height)?;
        if seeds.is_empty() {
            return Ok(());
        }

        let mut errs = Array2::zeros((height + 1, width + 1));
        for seed in seeds {
            let y = seed / width;
            let x = seed % width;
            let r = radius.generate(rng);
            splat_rect(&mut errs, x, y, r, r, width, height);
        }
        prefix_sum(&mut errs);

        for y in 0..height {
            for x in 0..width {
                let count = errs[[y, x]];
                if count > 0.0 {
                    let factor = self.transparency.powf(count);
                    for j in 0..channels {
                        let value = view[[y, x, j]].to_f64();
                        view[[y, x, j]] = T::from_f64(value * factor);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Rain streaks: thin vertical splats plus channel noise that grows
/// with the streak count; the blue channel is boosted.
///
/// RGB values are either in [0, 1] or in {0, ..., 255}; `range` selects
/// which convention with the value 1 or 255.
pub struct Rain {
    probability_key: String,
    range_key: String,
    probability: f64,
    range: f64,
}

impl Rain {
    pub fn new(probability_key: impl Into<String>, range_key: impl Into<String>) -> Self {
        Self {
            probability_key: probability_key.into(),
            range_key: range_key.into(),
            probability: 0.0,
            range: 255.0,
        }
    }
}

impl<T: Element> Filter<T> for Rain {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.probability = params.f64(&self.probability_key)?;
        self.range = params.f64(&self.range_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let mut view = as_image(data, "rain")?;
        let (height, width, channels) = view.dim();

        let seeds = corruption_seeds(rng, self.probability, width * height)?;
        let mut errs = Array2::zeros((height + 1, width + 1));
        for seed in seeds {
            let y = seed / width;
            let x = seed % width;
            let y_radius = random::normal(rng, 20.0, 10.0).round().max(0.0) as usize;
            splat_rect(&mut errs, x, y, 1, y_radius, width, height);
        }
        prefix_sum(&mut errs);

        for j in 0..channels {
            // Draws cover the whole accumulator grid so the stream stays
            // aligned no matter where the streaks landed.
            for y in 0..=height {
                for x in 0..=width {
                    let streaks = errs[[y, x]];
                    let loc = 5.0 * streaks;
                    let scale = 10.0 * (streaks / 12.0).sqrt() + 4.0 * streaks;
                    let mut add = random::normal(rng, loc, scale);
                    if j == 2 {
                        add += 30.0 * streaks;
                    }

                    if y < height && x < width {
                        let value = view[[y, x, j]].to_f64();
                        let rained = if self.range == 1.0 {
                            (value + add / 255.0).clamp(0.0, 1.0)
                        } else {
                            (value + add.trunc()).clamp(0.0, 255.0)
                        };
                        view[[y, x, j]] = T::from_f64(rained);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Snowflake splats with circular falloff plus a perlin-noise
/// snowstorm layer. Assumes the {0, ..., 255} value convention.
pub struct Snow {
    snowflake_probability_key: String,
    snowflake_alpha_key: String,
    snowstorm_alpha_key: String,
    snowflake_probability: f64,
    snowflake_alpha: f64,
    snowstorm_alpha: f64,
}

impl Snow {
    pub fn new(
        snowflake_probability_key: impl Into<String>,
        snowflake_alpha_key: impl Into<String>,
        snowstorm_alpha_key: impl Into<String>,
    ) -> Self {
        Self {
            snowflake_probability_key: snowflake_probability_key.into(),
            snowflake_alpha_key: snowflake_alpha_key.into(),
            snowstorm_alpha_key: snowstorm_alpha_key.into(),
            snowflake_probability: 0.0,
            snowflake_alpha: 0.0,
            snowstorm_alpha: 0.0,
        }
    }

    fn build_snowflake(&self, radius: usize) -> Array2<f64> {
        let side = 2 * radius + 1;
        let mut flake = Array2::zeros((side, side));
        for y in 0..side {
            for x in 0..side {
                let dy = y as f64 - radius as f64;
                let dx = x as f64 - radius as f64;
                let dist = (dx * dx + dy * dy).sqrt();
                flake[[y, x]] = if radius == 0 {
                    1.0
                } else {
                    (1.0 - dist / radius as f64).max(0.0)
                };
            }
        }
        flake * self.snowflake_alpha
    }
}

/// Gradient noise on a 2x2 lattice, values in [-1, 1].
fn perlin_noise(height: usize, width: usize, rng: &mut SeededRng) -> Array2<f64> {
    fn fade(t: f64) -> f64 {
        6.0 * t.powi(5) - 15.0 * t.powi(4) + 10.0 * t.powi(3)
    }

    let mut gradients = [[(0.0_f64, 0.0_f64); 2]; 2];
    for row in &mut gradients {
        for gradient in row.iter_mut() {
            let angle = 2.0 * std::f64::consts::PI * random::uniform(rng);
            *gradient = (angle.cos(), angle.sin());
        }
    }

    let mut noise = Array2::zeros((height, width));
    for y in 0..height {
        let gy = y as f64 / height as f64;
        for x in 0..width {
            let gx = x as f64 / width as f64;

            let n00 = gy * gradients[0][0].0 + gx * gradients[0][0].1;
            let n10 = (gy - 1.0) * gradients[1][0].0 + gx * gradients[1][0].1;
            let n01 = gy * gradients[0][1].0 + (gx - 1.0) * gradients[0][1].1;
            let n11 = (gy - 1.0) * gradients[1][1].0 + (gx - 1.0) * gradients[1][1].1;

            let t0 = fade(gy);
            let t1 = fade(gx);
            let n0 = n00 * (1.0 - t0) + t0 * n10;
            let n1 = n01 * (1.0 - t0) + t0 * n11;
            noise[[y, x]] = std::f64::consts::SQRT_2 * ((1.0 - t1) * n0 + t1 * n1);
        }
    }
    noise
}

impl<T: Element> Filter<T> for Snow {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.snowflake_probability = params.f64(&self.snowflake_probability_key)?;
        self.snowflake_alpha = params.f64(&self.snowflake_alpha_key)?;
        self.snowstorm_alpha = params.f64(&self.snowstorm_alpha_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let mut view = as_image(data, "snow")?;
        let (height, width, channels) = view.dim();

        let seeds = corruption_seeds(rng, self.snowflake_probability, width * height)?;
        let mut flakes: Vec<Array2<f64>> = Vec::new();
        for seed in seeds {
            let y = (seed / width) as i64;
            let x = (seed % width) as i64;
            let radius = random::normal(rng, 5.0, 2.0).round();
            if radius <= 0.0 {
                continue;
            }
            let radius = radius as usize;
            while flakes.len() <= radius {
                flakes.push(self.build_snowflake(flakes.len()));
            }

            let r = radius as i64;
            let y0 = (y - r).max(0);
            let x0 = (x - r).max(0);
            let y1 = (y + r).min(height as i64 - 1) + 1;
            let x1 = (x + r).min(width as i64 - 1) + 1;
            let flake = &flakes[radius];

            for j in 0..channels {
                for yy in y0..y1 {
                    for xx in x0..x1 {
                        let fy = (yy - (y - r)) as usize;
                        let fx = (xx - (x - r)) as usize;
                        let value = view[[yy as usize, xx as usize, j]].to_f64();
                        let flaked =
                            T::from_f64((255.0 - value) * flake[[fy, fx]]).to_f64();
                        view[[yy as usize, xx as usize, j]] = T::from_f64(value + flaked);
                    }
                }
            }
        }

        let mut storm = perlin_noise(height, width, rng);
        storm.mapv_inplace(|v| (v + 1.0) / 2.0);
        for j in 0..channels {
            for y in 0..height {
                for x in 0..width {
                    let value = view[[y, x, j]].to_f64();
                    let added = T::from_f64(
                        self.snowstorm_alpha * (255.0 - value) * storm[[y, x]],
                    )
                    .to_f64();
                    view[[y, x, j]] = T::from_f64(value + added);
                }
            }
        }
        Ok(())
    }
}

/// Lens flare walking from the brightest image region toward the image
/// center, drawing warm-colored discs along the way. No parameters.
pub struct LensFlare;

impl LensFlare {
    fn flare<T: Element>(
        view: &mut ArrayViewMut3<'_, T>,
        rng: &mut SeededRng,
        x0: i64,
        y0: i64,
        radius: i64,
    ) {
        let (height, width, _) = view.dim();
        let green_target = rng.gen_range(130..180) as f64;
        let red_target = rng.gen_range(220..255) as f64;
        let blue_target = rng.gen_range(0..50) as f64;
        let x_offset = random::normal(rng, 0.0, 5.0);
        let y_offset = random::normal(rng, 0.0, 5.0);

        for x in (x0 - radius)..=(x0 + radius) {
            for y in (y0 - radius)..=(y0 + radius) {
                if y < 0 || x < 0 || y >= height as i64 || x >= width as i64 {
                    continue;
                }
                let dx = (x - x0) as f64;
                let dy = (y - y0) as f64;
                if (dx * dx + dy * dy).sqrt() > radius as f64 {
                    continue;
                }
                let offset_dist =
                    ((dx + x_offset).powi(2) + (dy + y_offset).powi(2)).sqrt();

                let (yi, xi) = (y as usize, x as usize);
                let red = view[[yi, xi, 0]].to_f64();
                let green = view[[yi, xi, 1]].to_f64();
                let blue = view[[yi, xi, 2]].to_f64();

                let a = 3.0;
                let t = (1.0 - (radius as f64 - offset_dist) / radius as f64).clamp(0.0, 1.0);
                let visibility = (a * t * t + (1.0 - a) * t).max(0.0) * 0.8;

                view[[yi, xi, 0]] = T::from_f64((red + (red_target - red) * visibility).round());
                view[[yi, xi, 1]] =
                    T::from_f64((green + (green_target - green) * visibility).round());
                view[[yi, xi, 2]] =
                    T::from_f64((blue + (blue_target - blue) * visibility).round());
            }
        }
    }
}

impl<T: Element> Filter<T> for LensFlare {
    fn resolve(&mut self, _params: &ParamMap) -> Result<(), FaultError> {
        Ok(())
    }

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, T>,
        rng: &mut SeededRng,
        _ctx: &DimContext,
    ) -> Result<(), FaultError> {
        let mut view = as_image(data, "lens flare")?;
        let (height, width, channels) = view.dim();
        if channels < 3 {
            return Err(FaultError::ShapeMismatch {
                context: "lens flare",
                expected: "at least 3 channels".to_string(),
                got: format!("{:?}", view.shape()),
            });
        }

        // Estimate the brightest spot as the intensity-weighted centroid.
        let mut channel_sums = [0.0_f64; 3];
        for y in 0..height {
            for x in 0..width {
                for j in 0..3 {
                    channel_sums[j] += view[[y, x, j]].to_f64();
                }
            }
        }
        if channel_sums.iter().any(|&sum| sum <= 0.0) {
            return Ok(());
        }

        let mut expected_x = [0.0_f64; 3];
        let mut expected_y = [0.0_f64; 3];
        for y in 0..height {
            for x in 0..width {
                for j in 0..3 {
                    let weight = view[[y, x, j]].to_f64() / channel_sums[j];
                    expected_x[j] += x as f64 * weight;
                    expected_y[j] += y as f64 * weight;
                }
            }
        }
        let best_x = ((expected_x[0] + expected_x[1] + expected_x[2]) / 3.0) as i64;
        let best_y = ((expected_y[0] + expected_y[1] + expected_y[2]) / 3.0) as i64;

        let center_x = width as f64 / 2.0;
        let center_y = height as f64 / 2.0;
        let mut direction = (center_x - best_x as f64, center_y - best_y as f64);
        let norm = (direction.0 * direction.0 + direction.1 * direction.1).sqrt();
        if norm == 0.0 {
            direction = (1.0, 0.0);
        } else {
            direction = (direction.0 / norm, direction.1 / norm);
        }

        let start_dist = (best_x as f64 - center_x).powi(2) + (best_y as f64 - center_y).powi(2);
        let mut x = best_x as f64;
        let mut y = best_y as f64;
        let mut steps = 0.0_f64;
        loop {
            if steps < 0.0 {
                let radius = random::normal(rng, 100.0, 100.0).max(40.0).round();
                Self::flare(&mut view, rng, x as i64, y as i64, radius as i64);
                steps = random::normal(rng, radius, 15.0);
            }
            let current_dist = (x - center_x).powi(2) + (y - center_y).powi(2);
            if start_dist + 1.0 <= current_dist {
                break;
            }
            x += direction.0;
            y += direction.1;
            steps -= 1.0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{corruption_seeds, prefix_sum, splat_rect, LensFlare, MissingArea, Rain, Snow, StainArea};
    use crate::filters::Filter;
    use crate::params::{ParamMap, ParamValue};
    use crate::radius::{ProbabilityArrayRadius, RadiusGenerator};
    use crate::random::seeded;
    use crate::tree::DimContext;
    use ndarray::{Array2, ArrayD, IxDyn};
    use std::sync::Arc;

    fn fixed_radius(radius: usize) -> ParamValue {
        let mut probabilities = vec![0.0; radius + 1];
        probabilities[radius] = 1.0;
        let generator: Arc<dyn RadiusGenerator> =
            Arc::new(ProbabilityArrayRadius::new(probabilities));
        ParamValue::Radius(generator)
    }

    fn image(height: usize, width: usize, value: f64) -> ArrayD<f64> {
        ArrayD::from_elem(IxDyn(&[height, width, 3]), value)
    }

    #[test]
    fn zero_probability_yields_no_seeds() {
        let mut rng = seeded(1);
        assert!(corruption_seeds(&mut rng, 0.0, 100).unwrap().is_empty());
    }

    #[test]
    fn certain_probability_seeds_every_cell() {
        let mut rng = seeded(1);
        let seeds = corruption_seeds(&mut rng, 1.0, 10).unwrap();
        assert_eq!(seeds, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn splat_and_prefix_sum_materialize_the_rectangle() {
        let mut errs = Array2::zeros((5, 5));
        splat_rect(&mut errs, 1, 1, 1, 1, 4, 4);
        prefix_sum(&mut errs);
        for y in 0..4 {
            for x in 0..4 {
                let inside = y <= 2 && x <= 2;
                assert_eq!(errs[[y, x]] > 0.0, inside, "cell ({y}, {x})");
            }
        }
    }

    #[test]
    fn missing_area_zero_probability_is_the_identity() {
        let mut filter = MissingArea::new("prob", "radius", "missing");
        let params = ParamMap::new()
            .with("prob", 0.0)
            .with("radius", fixed_radius(1))
            .with("missing", f64::NAN);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();

        let mut data = ArrayD::<f64>::from_elem(IxDyn(&[8, 8]), 1.0);
        filter
            .apply(data.view_mut(), &mut seeded(4), &DimContext::new())
            .unwrap();
        assert!(data.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn missing_area_stains_are_deterministic() {
        let params = ParamMap::new()
            .with("prob", 0.2)
            .with("radius", fixed_radius(1))
            .with("missing", f64::NAN);

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let mut filter = MissingArea::new("prob", "radius", "missing");
            Filter::<f64>::resolve(&mut filter, &params).unwrap();
            let mut data = ArrayD::<f64>::from_elem(IxDyn(&[10, 10]), 1.0);
            filter
                .apply(data.view_mut(), &mut seeded(21), &DimContext::new())
                .unwrap();
            outputs.push(data);
        }

        let missing: usize = outputs[0].iter().filter(|v| v.is_nan()).count();
        assert!(missing > 0);
        for (a, b) in outputs[0].iter().zip(outputs[1].iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn missing_area_requires_two_axes() {
        let mut filter = MissingArea::new("prob", "radius", "missing");
        let params = ParamMap::new()
            .with("prob", 0.5)
            .with("radius", fixed_radius(0))
            .with("missing", f64::NAN);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();

        let mut data = ArrayD::from_elem(IxDyn(&[8]), 1.0);
        let result = filter.apply(data.view_mut(), &mut seeded(4), &DimContext::new());
        assert!(matches!(
            result,
            Err(crate::FaultError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn opaque_stains_zero_out_pixels() {
        let mut filter = StainArea::new("prob", "radius", "transparency");
        let params = ParamMap::new()
            .with("prob", 0.5)
            .with("radius", fixed_radius(1))
            .with("transparency", 0.0);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();

        let mut data = image(10, 10, 200.0);
        filter
            .apply(data.view_mut(), &mut seeded(8), &DimContext::new())
            .unwrap();
        assert!(data.iter().any(|&v| v == 0.0));
        assert!(data.iter().all(|&v| v == 0.0 || v == 200.0));
    }

    #[test]
    fn invisible_stains_change_nothing() {
        let mut filter = StainArea::new("prob", "radius", "transparency");
        let params = ParamMap::new()
            .with("prob", 0.5)
            .with("radius", fixed_radius(1))
            .with("transparency", 1.0);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();

        let mut data = image(10, 10, 200.0);
        filter
            .apply(data.view_mut(), &mut seeded(8), &DimContext::new())
            .unwrap();
        assert!(data.iter().all(|&v| v == 200.0));
    }

    #[test]
    fn rain_stays_in_range_and_reproduces() {
        let params = ParamMap::new().with("prob", 0.05).with("range", 255.0);

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let mut filter = Rain::new("prob", "range");
            Filter::<f64>::resolve(&mut filter, &params).unwrap();
            let mut data = image(12, 12, 100.0);
            filter
                .apply(data.view_mut(), &mut seeded(33), &DimContext::new())
                .unwrap();
            outputs.push(data);
        }

        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0].shape(), &[12, 12, 3]);
        assert!(outputs[0].iter().all(|&v| (0.0..=255.0).contains(&v)));
    }

    #[test]
    fn snow_brightens_but_never_overshoots() {
        let mut filter = Snow::new("flake_prob", "flake_alpha", "storm_alpha");
        let params = ParamMap::new()
            .with("flake_prob", 0.05)
            .with("flake_alpha", 0.8)
            .with("storm_alpha", 0.5);
        Filter::<f64>::resolve(&mut filter, &params).unwrap();

        let mut data = image(12, 12, 50.0);
        filter
            .apply(data.view_mut(), &mut seeded(13), &DimContext::new())
            .unwrap();
        assert_eq!(data.shape(), &[12, 12, 3]);
        assert!(data.iter().all(|&v| (0.0..=255.0).contains(&v)));
        assert!(data.iter().any(|&v| v > 50.0));
    }

    #[test]
    fn lens_flare_reproduces_per_seed() {
        let mut data_a = image(16, 16, 30.0);
        data_a[[4, 4, 0]] = 250.0;
        data_a[[4, 4, 1]] = 250.0;
        data_a[[4, 4, 2]] = 250.0;
        let mut data_b = data_a.clone();

        let mut filter = LensFlare;
        Filter::<f64>::resolve(&mut filter, &ParamMap::new()).unwrap();
        filter
            .apply(data_a.view_mut(), &mut seeded(55), &DimContext::new())
            .unwrap();
        filter
            .apply(data_b.view_mut(), &mut seeded(55), &DimContext::new())
            .unwrap();

        assert_eq!(data_a, data_b);
        assert_eq!(data_a.shape(), &[16, 16, 3]);
    }
}
