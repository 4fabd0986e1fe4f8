use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConnectorError;
use crate::table::DataTable;

/// Raw JSON-stat response as served by the provider's statistics API.
/// Everything is optional at this layer; `validate` turns it into a
/// `Dataset` or rejects it with a format error.
#[derive(Debug, Deserialize)]
pub struct JsonStatResponse {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub id: Option<Vec<String>>,
    #[serde(default)]
    pub size: Option<Vec<usize>>,
    #[serde(default)]
    pub dimension: Option<HashMap<String, Dimension>>,
    #[serde(default)]
    pub value: Option<ValueContainer>,
}

#[derive(Debug, Deserialize)]
pub struct Dimension {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub index: Option<CategoryIndex>,
    #[serde(default)]
    pub label: Option<HashMap<String, String>>,
}

/// JSON-stat allows `category.index` as an ordered key array or as a
/// key-to-position map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CategoryIndex {
    Keys(Vec<String>),
    Positions(HashMap<String, usize>),
}

/// Dense ordered sequence, or sparse map from linear-index string to value.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ValueContainer {
    Dense(Vec<Option<f64>>),
    Sparse(HashMap<String, Option<f64>>),
}

/// One axis of the array, resolved once at validation time.
#[derive(Debug, Clone)]
pub struct DimensionSpec {
    pub id: String,
    pub size: usize,
    pub category_order: Vec<String>,
    pub category_labels: HashMap<String, String>,
}

impl DimensionSpec {
    /// Resolves an axis coordinate to its human-readable label, falling back
    /// to the raw category key. A coordinate beyond the declared category
    /// list resolves to `None`; declared sizes and actual category lists do
    /// disagree in real provider payloads.
    pub fn resolve(&self, position: usize) -> Option<String> {
        let key = self.category_order.get(position)?;
        Some(
            self.category_labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| key.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    pub categories: Vec<Option<String>>,
    pub value: Option<f64>,
}

/// A structurally valid JSON-stat dataset, ready for decoding.
#[derive(Debug)]
pub struct Dataset {
    pub dimensions: Vec<DimensionSpec>,
    pub values: ValueContainer,
}

impl JsonStatResponse {
    pub fn validate(self) -> Result<Dataset, ConnectorError> {
        let mut dimension = self.dimension.ok_or_else(|| missing_field("dimension"))?;
        let values = self.value.ok_or_else(|| missing_field("value"))?;
        let ids = self.id.ok_or_else(|| missing_field("id"))?;
        let sizes = self.size.ok_or_else(|| missing_field("size"))?;

        if ids.len() != sizes.len() {
            return Err(ConnectorError::DatasetFormat {
                message: format!(
                    "dimension ids and sizes disagree: {} ids, {} sizes",
                    ids.len(),
                    sizes.len()
                ),
            });
        }

        let dimensions = ids
            .into_iter()
            .zip(sizes)
            .map(|(id, size)| {
                let dim = dimension
                    .remove(&id)
                    .ok_or_else(|| ConnectorError::DatasetFormat {
                        message: format!("dimension `{}` has no entry in the dimension map", id),
                    })?;
                let category = dim.category.unwrap_or_default();
                let category_order = match category.index {
                    Some(CategoryIndex::Keys(keys)) => keys,
                    Some(CategoryIndex::Positions(map)) => {
                        let mut entries: Vec<(String, usize)> = map.into_iter().collect();
                        entries.sort_by_key(|(_, position)| *position);
                        entries.into_iter().map(|(key, _)| key).collect()
                    }
                    None => Vec::new(),
                };
                Ok(DimensionSpec {
                    id,
                    size,
                    category_order,
                    category_labels: category.label.unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, ConnectorError>>()?;

        Ok(Dataset { dimensions, values })
    }
}

impl Dataset {
    /// Dense cell count: the product of all dimension sizes.
    pub fn total_cells(&self) -> u64 {
        self.dimensions.iter().map(|d| d.size as u64).product()
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.dimensions.iter().map(|d| d.id.clone()).collect();
        columns.push("value".to_string());
        columns
    }

    /// Flattens the value array into one row per addressed cell. Dense
    /// containers produce the full cross product; sparse containers produce
    /// one row per present key. A fully empty dataset yields zero rows.
    pub fn decode(&self) -> Vec<DecodedRow> {
        let sizes: Vec<usize> = self.dimensions.iter().map(|d| d.size).collect();
        let indices = self.cell_indices();

        let mut rows = Vec::with_capacity(indices.len());
        for index in indices {
            let coordinates = unravel(index, &sizes);
            let categories = self
                .dimensions
                .iter()
                .zip(&coordinates)
                .map(|(dim, &position)| dim.resolve(position))
                .collect();
            rows.push(DecodedRow {
                categories,
                value: self.value_at(index),
            });
        }
        rows
    }

    pub fn to_table(&self) -> DataTable {
        let mut table = DataTable::new(self.column_names());
        for row in self.decode() {
            let mut cells = row.categories;
            cells.push(row.value.map(|v| v.to_string()));
            table.push_row(cells);
        }
        table
    }

    fn cell_indices(&self) -> Vec<u64> {
        match &self.values {
            ValueContainer::Dense(values) if values.is_empty() => Vec::new(),
            ValueContainer::Dense(_) => (0..self.total_cells()).collect(),
            ValueContainer::Sparse(values) => {
                let mut indices = Vec::with_capacity(values.len());
                for key in values.keys() {
                    match key.parse::<u64>() {
                        Ok(index) => indices.push(index),
                        Err(_) => warn!("Skipping value at non-numeric key `{}`", key),
                    }
                }
                indices.sort_unstable();
                indices
            }
        }
    }

    fn value_at(&self, index: u64) -> Option<f64> {
        match &self.values {
            ValueContainer::Dense(values) => values.get(index as usize).copied().flatten(),
            ValueContainer::Sparse(values) => values.get(&index.to_string()).copied().flatten(),
        }
    }
}

fn missing_field(field: &str) -> ConnectorError {
    ConnectorError::DatasetFormat {
        message: format!("missing `{}` field", field),
    }
}

/// Decomposes a linear index into per-dimension coordinates. The provider
/// serializes cells with the last-declared dimension varying fastest, so the
/// radix walk runs over the sizes in reverse and the coordinates are then
/// reversed back into declared order.
fn unravel(mut index: u64, sizes: &[usize]) -> Vec<usize> {
    let mut coordinates = Vec::with_capacity(sizes.len());
    for &size in sizes.iter().rev() {
        if size == 0 {
            coordinates.push(0);
            continue;
        }
        coordinates.push((index % size as u64) as usize);
        index /= size as u64;
    }
    coordinates.reverse();
    coordinates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ravel(coordinates: &[usize], sizes: &[usize]) -> u64 {
        coordinates
            .iter()
            .zip(sizes)
            .fold(0u64, |acc, (&coord, &size)| acc * size as u64 + coord as u64)
    }

    #[test]
    fn unravel_inverts_ravel_for_every_cell() {
        let sizes = [2usize, 3, 4];
        for a in 0..2 {
            for b in 0..3 {
                for c in 0..4 {
                    let coordinates = vec![a, b, c];
                    let index = ravel(&coordinates, &sizes);
                    assert_eq!(
                        unravel(index, &sizes),
                        coordinates,
                        "round-trip failed for index {}",
                        index
                    );
                }
            }
        }
    }

    #[test]
    fn last_dimension_varies_fastest() {
        let sizes = [2usize, 3];
        assert_eq!(unravel(0, &sizes), vec![0, 0]);
        assert_eq!(unravel(1, &sizes), vec![0, 1]);
        assert_eq!(unravel(2, &sizes), vec![0, 2]);
        assert_eq!(unravel(3, &sizes), vec![1, 0]);
        assert_eq!(unravel(5, &sizes), vec![1, 2]);
    }

    #[test]
    fn unravel_tolerates_zero_sized_dimension() {
        // Malformed declared sizes must not panic; the out-of-range
        // coordinate resolves to null downstream.
        assert_eq!(unravel(7, &[2, 0, 3]), vec![0, 0, 1]);
    }
}
