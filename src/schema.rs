//! The feature schema: which descriptors a record holds, in which order,
//! and with how many rows each. Record construction and the table header
//! both derive from [`Feature::ALL`].

use ndarray::Array2;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Name of the identifier (index) column.
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Zcr,
    ChromaCqt,
    ChromaCens,
    Tonnetz,
    ChromaStft,
    Rmse,
    SpectralCentroid,
    SpectralBandwidth,
    SpectralContrast,
    SpectralRolloff,
    Mfcc,
}

impl Feature {
    /// Every feature, in column order.
    pub const ALL: [Feature; 11] = [
        Feature::Zcr,
        Feature::ChromaCqt,
        Feature::ChromaCens,
        Feature::Tonnetz,
        Feature::ChromaStft,
        Feature::Rmse,
        Feature::SpectralCentroid,
        Feature::SpectralBandwidth,
        Feature::SpectralContrast,
        Feature::SpectralRolloff,
        Feature::Mfcc,
    ];

    /// Column name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Zcr => "zcr",
            Self::ChromaCqt => "chroma_cqt",
            Self::ChromaCens => "chroma_cens",
            Self::Tonnetz => "tonnetz",
            Self::ChromaStft => "chroma_stft",
            Self::Rmse => "rmse",
            Self::SpectralCentroid => "spectral_centroid",
            Self::SpectralBandwidth => "spectral_bandwidth",
            Self::SpectralContrast => "spectral_contrast",
            Self::SpectralRolloff => "spectral_rolloff",
            Self::Mfcc => "mfcc",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Descriptor dimension (row count) of this feature's array.
    pub fn rows(self) -> usize {
        match self {
            Self::Zcr
            | Self::Rmse
            | Self::SpectralCentroid
            | Self::SpectralBandwidth
            | Self::SpectralRolloff => 1,
            Self::ChromaCqt | Self::ChromaCens | Self::ChromaStft => 12,
            Self::Tonnetz => 6,
            Self::SpectralContrast => 7,
            Self::Mfcc => 20,
        }
    }
}

/// Full column list: the identifier followed by every feature.
pub fn columns() -> Vec<&'static str> {
    std::iter::once(ID_COLUMN)
        .chain(Feature::ALL.iter().map(|f| f.name()))
        .collect()
}

/// One array per feature, each `rows × frames`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    pub zcr: Array2<f32>,
    pub chroma_cqt: Array2<f32>,
    pub chroma_cens: Array2<f32>,
    pub tonnetz: Array2<f32>,
    pub chroma_stft: Array2<f32>,
    pub rmse: Array2<f32>,
    pub spectral_centroid: Array2<f32>,
    pub spectral_bandwidth: Array2<f32>,
    pub spectral_contrast: Array2<f32>,
    pub spectral_rolloff: Array2<f32>,
    pub mfcc: Array2<f32>,
}

impl FeatureSet {
    pub fn get(&self, feature: Feature) -> &Array2<f32> {
        match feature {
            Feature::Zcr => &self.zcr,
            Feature::ChromaCqt => &self.chroma_cqt,
            Feature::ChromaCens => &self.chroma_cens,
            Feature::Tonnetz => &self.tonnetz,
            Feature::ChromaStft => &self.chroma_stft,
            Feature::Rmse => &self.rmse,
            Feature::SpectralCentroid => &self.spectral_centroid,
            Feature::SpectralBandwidth => &self.spectral_bandwidth,
            Feature::SpectralContrast => &self.spectral_contrast,
            Feature::SpectralRolloff => &self.spectral_rolloff,
            Feature::Mfcc => &self.mfcc,
        }
    }

    /// Arrays in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, &Array2<f32>)> {
        Feature::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    /// Build a set by asking `load` for each feature in column order,
    /// stopping at the first error.
    pub fn try_from_fn<E>(
        mut load: impl FnMut(Feature) -> Result<Array2<f32>, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            zcr: load(Feature::Zcr)?,
            chroma_cqt: load(Feature::ChromaCqt)?,
            chroma_cens: load(Feature::ChromaCens)?,
            tonnetz: load(Feature::Tonnetz)?,
            chroma_stft: load(Feature::ChromaStft)?,
            rmse: load(Feature::Rmse)?,
            spectral_centroid: load(Feature::SpectralCentroid)?,
            spectral_bandwidth: load(Feature::SpectralBandwidth)?,
            spectral_contrast: load(Feature::SpectralContrast)?,
            spectral_rolloff: load(Feature::SpectralRolloff)?,
            mfcc: load(Feature::Mfcc)?,
        })
    }
}

/// One table row: a file identifier and its features. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: String,
    pub features: FeatureSet,
}

impl FeatureRecord {
    pub fn new(id: impl Into<String>, features: FeatureSet) -> Self {
        Self {
            id: id.into(),
            features,
        }
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Feature::ALL.len() + 1))?;
        map.serialize_entry(ID_COLUMN, &self.id)?;
        for (feature, array) in self.features.iter() {
            map.serialize_entry(feature.name(), &array_rows(array))?;
        }
        map.end()
    }
}

/// Split an array into nested row vectors.
pub fn array_rows(array: &Array2<f32>) -> Vec<Vec<f32>> {
    array.rows().into_iter().map(|r| r.to_vec()).collect()
}

/// Rebuild an array from nested rows. Returns `None` if the rows are ragged.
pub fn array_from_rows(rows: Vec<Vec<f32>>) -> Option<Array2<f32>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != n_cols) {
        return None;
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn column_order_is_fixed() {
        assert_eq!(
            columns(),
            vec![
                "id",
                "zcr",
                "chroma_cqt",
                "chroma_cens",
                "tonnetz",
                "chroma_stft",
                "rmse",
                "spectral_centroid",
                "spectral_bandwidth",
                "spectral_contrast",
                "spectral_rolloff",
                "mfcc",
            ]
        );
    }

    #[test]
    fn names_resolve_back() {
        for f in Feature::ALL {
            assert_eq!(Feature::from_name(f.name()), Some(f));
        }
        assert_eq!(Feature::from_name("id"), None);
    }

    #[test]
    fn rows_round_trip_and_reject_ragged() {
        let a = array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert_eq!(array_from_rows(array_rows(&a)), Some(a));
        assert_eq!(array_from_rows(vec![vec![1.0], vec![1.0, 2.0]]), None);
    }

    #[test]
    fn try_from_fn_visits_in_column_order() {
        let mut seen = Vec::new();
        let set = FeatureSet::try_from_fn::<()>(|f| {
            seen.push(f);
            Ok(Array2::zeros((f.rows(), 2)))
        })
        .unwrap();
        assert_eq!(seen, Feature::ALL.to_vec());
        assert_eq!(set.get(Feature::Mfcc).dim(), (20, 2));
    }

    #[test]
    fn record_serializes_in_column_order() {
        let set = FeatureSet::try_from_fn::<()>(|f| Ok(Array2::zeros((f.rows(), 1)))).unwrap();
        let json = serde_json::to_string(&FeatureRecord::new("a.wav", set)).unwrap();
        assert!(json.starts_with(r#"{"id":"a.wav","zcr":[[0.0]],"chroma_cqt":"#));
        assert!(json.ends_with(r#""mfcc":[[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0],[0.0]]}"#));
    }
}
