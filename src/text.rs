//! OCR-style text corruption.
//!
//! Lightweight sibling of the numeric filter chain for tensors of
//! string cells, with the same resolve / apply-in-place / reset
//! contract and the same determinism guarantees.

use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewMutD};

use crate::filters::corruption_seeds;
use crate::params::{CharDistribution, ParamMap};
use crate::radius::RadiusGenerator;
use crate::random::{self, SeededRng};
use crate::FaultError;

/// An error source attachable to a [TextArray].
pub trait TextFilter: Send {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError>;

    fn apply(
        &mut self,
        data: ArrayViewMutD<'_, String>,
        rng: &mut SeededRng,
    ) -> Result<(), FaultError>;

    fn reset(&mut self) {}
}

/// Leaf node holding a chain of text filters.
pub struct TextArray {
    shape: Option<Vec<usize>>,
    filters: Vec<Box<dyn TextFilter>>,
}

impl TextArray {
    pub fn new() -> Self {
        Self {
            shape: None,
            filters: Vec::new(),
        }
    }

    pub fn with_shape(shape: impl Into<Vec<usize>>) -> Self {
        Self {
            shape: Some(shape.into()),
            filters: Vec::new(),
        }
    }

    pub fn add_filter(&mut self, filter: impl TextFilter + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Builder form of [TextArray::add_filter].
    pub fn with_filter(mut self, filter: impl TextFilter + 'static) -> Self {
        self.add_filter(filter);
        self
    }

    /// One full run: resolve against the sweep point's parameters,
    /// reset, then apply the chain in declaration order.
    pub fn process(
        &mut self,
        data: &mut ArrayD<String>,
        params: &ParamMap,
        rng: &mut SeededRng,
    ) -> Result<(), FaultError> {
        if let Some(shape) = &self.shape {
            if shape.as_slice() != data.shape() {
                return Err(FaultError::ShapeMismatch {
                    context: "text array node",
                    expected: format!("{shape:?}"),
                    got: format!("{:?}", data.shape()),
                });
            }
        }

        for filter in &mut self.filters {
            filter.resolve(params)?;
            filter.reset();
        }
        for filter in &mut self.filters {
            filter.apply(data.view_mut(), rng)?;
        }
        Ok(())
    }
}

impl Default for TextArray {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts each character to uppercase with the given probability.
pub struct Uppercase {
    probability_key: String,
    probability: f64,
}

impl Uppercase {
    pub fn new(probability_key: impl Into<String>) -> Self {
        Self {
            probability_key: probability_key.into(),
            probability: 0.0,
        }
    }
}

impl TextFilter for Uppercase {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.probability = params.f64(&self.probability_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, String>,
        rng: &mut SeededRng,
    ) -> Result<(), FaultError> {
        for cell in data.iter_mut() {
            let mut upcased = String::with_capacity(cell.len());
            for c in cell.chars() {
                if random::uniform(rng) <= self.probability {
                    upcased.extend(c.to_uppercase());
                } else {
                    upcased.push(c);
                }
            }
            *cell = upcased;
        }
        Ok(())
    }
}

/// Replaces characters according to a per-character weighted
/// distribution, each with probability p.
pub struct OcrError {
    table_key: String,
    p_key: String,
    table: BTreeMap<char, CharDistribution>,
    p: f64,
}

impl OcrError {
    pub fn new(table_key: impl Into<String>, p_key: impl Into<String>) -> Self {
        Self {
            table_key: table_key.into(),
            p_key: p_key.into(),
            table: BTreeMap::new(),
            p: 0.0,
        }
    }

    fn replace_char(&self, c: char, rng: &mut SeededRng) -> char {
        let Some(distribution) = self.table.get(&c) else {
            return c;
        };
        if random::uniform(rng) >= self.p {
            return c;
        }

        let total: f64 = distribution.iter().map(|(_, weight)| weight).sum();
        if total <= 0.0 {
            return c;
        }
        let draw = random::uniform(rng) * total;
        let mut cumulative = 0.0;
        for (replacement, weight) in distribution {
            cumulative += weight;
            if draw < cumulative {
                return *replacement;
            }
        }
        distribution.last().map(|(r, _)| *r).unwrap_or(c)
    }
}

impl TextFilter for OcrError {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.table = params.char_table(&self.table_key)?.clone();
        self.p = params.f64(&self.p_key)?;
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, String>,
        rng: &mut SeededRng,
    ) -> Result<(), FaultError> {
        for cell in data.iter_mut() {
            *cell = cell.chars().map(|c| self.replace_char(c, rng)).collect();
        }
        Ok(())
    }
}

/// Stains on scanned text: rectangular blotches on the row/column grid
/// of each cell's string, stained characters replaced with the missing
/// text. Newlines survive.
pub struct MissingAreaText {
    probability_key: String,
    radius_key: String,
    missing_value_key: String,
    probability: f64,
    radius: Option<Arc<dyn RadiusGenerator>>,
    missing_value: String,
}

impl MissingAreaText {
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
            missing_value: " ".to_string(),
        }
    }

    fn stain_cell(&self, text: &str, rng: &mut SeededRng) -> Result<String, FaultError> {
        // Row geometry: newline characters delimit rows and are never
        // stained.
        let chars: Vec<char> = text.chars().collect();
        let mut row_starts = vec![0_usize];
        for (index, c) in chars.iter().enumerate() {
            if *c == '\n' {
                row_starts.push(index + 1);
            }
        }
        if *row_starts.last().unwrap_or(&0) != chars.len() {
            row_starts.push(chars.len());
        }
        let height = row_starts.len() - 1;

        let widths: Vec<usize> = (0..height)
            .map(|row| (row_starts[row + 1] - row_starts[row]).saturating_sub(1))
            .collect();
        let width = widths.iter().copied().max().unwrap_or(0);

        let radius = self
            .radius
            .as_ref()
            .ok_or_else(|| FaultError::MissingParameter {
                key: self.radius_key.clone(),
            })?;

        let seeds = corruption_seeds(rng, self.probability, width * height)?;
        if seeds.is_empty() {
            return Ok(text.to_string());
        }

        let mut errs = vec![vec![0.0_f64; width + 1]; height + 1];
        for seed in seeds {
            let y = seed / width;
            let x = seed % width;
            let r = radius.generate(rng);
            let x0 = x.saturating_sub(r);
            let x1 = (x + r + 1).min(width);
            let y0 = y.saturating_sub(r);
            let y1 = (y + r + 1).min(height);
            errs[y0][x0] += 1.0;
            errs[y0][x1] -= 1.0;
            errs[y1][x0] -= 1.0;
            errs[y1][x1] += 1.0;
        }
        for y in 1..=height {
            for x in 0..=width {
                errs[y][x] += errs[y - 1][x];
            }
        }
        for y in 0..=height {
            for x in 1..=width {
                errs[y][x] += errs[y][x - 1];
            }
        }

        let mut mask = vec![false; chars.len()];
        for y in 0..height {
            let start = row_starts[y];
            for x in 0..widths[y] {
                mask[start + x] = errs[y][x] > 0.0;
            }
        }

        let replacement = self.missing_value.chars().next().unwrap_or(' ');
        Ok(chars
            .iter()
            .enumerate()
            .map(|(index, c)| if mask[index] { replacement } else { *c })
            .collect())
    }
}

impl TextFilter for MissingAreaText {
    fn resolve(&mut self, params: &ParamMap) -> Result<(), FaultError> {
        self.probability = params.f64(&self.probability_key)?;
        self.radius = Some(params.radius(&self.radius_key)?);
        self.missing_value = params.str(&self.missing_value_key)?.to_string();
        Ok(())
    }

    fn apply(
        &mut self,
        mut data: ArrayViewMutD<'_, String>,
        rng: &mut SeededRng,
    ) -> Result<(), FaultError> {
        if self.probability == 0.0 {
            return Ok(());
        }
        for cell in data.iter_mut() {
            *cell = self.stain_cell(cell, rng)?;
        }
        Ok(())
    }
}
