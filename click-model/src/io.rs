//! Storage of fitted model parameters.

use std::{
    collections::HashMap,
    convert::TryFrom,
    io::{self, Read, Write},
};

use bincode::Options;
use ndarray::{Array, Dim, Dimension, IntoDimension, Ix, IxDyn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A flattened array in row-major order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlattenedParams {
    shape: Vec<Ix>,
    /// Invariant: the length equals the product of the shape.
    data: Vec<f64>,
}

impl<D> From<Array<f64, D>> for FlattenedParams
where
    D: Dimension,
{
    fn from(array: Array<f64, D>) -> Self {
        let shape = array.shape().to_owned();
        let data = if array.is_standard_layout() {
            array.into_raw_vec()
        } else {
            array.iter().copied().collect()
        };
        Self { shape, data }
    }
}

impl<'de> Deserialize<'de> for FlattenedParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            shape: Vec<Ix>,
            data: Vec<f64>,
        }

        let helper = Helper::deserialize(deserializer)?;
        let expected = helper.shape.iter().product::<usize>();
        if helper.data.len() == expected {
            Ok(Self {
                shape: helper.shape,
                data: helper.data,
            })
        } else {
            Err(<D::Error as serde::de::Error>::custom(
                ParamStoreError::UnexpectedShape {
                    got: helper.data.len(),
                    expected,
                },
            ))
        }
    }
}

impl FlattenedParams {
    fn into_array<D>(self) -> Result<Array<f64, D>, ParamStoreError>
    where
        D: Dimension + TryIntoDimension,
    {
        let shape = D::try_from(&self.shape)?;
        // the length is checked on construction and deserialization
        Ok(Array::from(self.data)
            .into_shape(shape)
            .unwrap_or_else(|_| unreachable!()))
    }
}

/// Creates dimensions of a fixed rank from a deserialized shape.
pub trait TryIntoDimension: Sized {
    fn try_from(slice: &[Ix]) -> Result<Self, ParamStoreError>;
}

impl<const N: usize> TryIntoDimension for Dim<[Ix; N]>
where
    [Ix; N]: IntoDimension<Dim = Dim<[Ix; N]>>,
{
    fn try_from(slice: &[Ix]) -> Result<Self, ParamStoreError> {
        <[Ix; N]>::try_from(slice)
            .map(IntoDimension::into_dimension)
            .map_err(|_| ParamStoreError::UnexpectedShape {
                got: slice.len(),
                expected: N,
            })
    }
}

impl TryIntoDimension for IxDyn {
    fn try_from(slice: &[Ix]) -> Result<Self, ParamStoreError> {
        Ok(slice.into_dimension())
    }
}

/// Potential errors of the parameter store.
#[derive(Debug, Error)]
pub enum ParamStoreError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialization(#[from] bincode::Error),

    #[error("Unexpected shape of the parameters: got={got}, expected={expected}")]
    UnexpectedShape { got: usize, expected: usize },

    #[error("Missing parameters for {name}.")]
    MissingParameters { name: String },
}

/// Named parameter arrays, serialized with bincode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamStore {
    params: HashMap<String, FlattenedParams>,
}

impl ParamStore {
    fn setup_bincode() -> impl Options {
        // we explicitly set some default options to
        // convey exactly which options we use.
        bincode::DefaultOptions::new()
            .with_little_endian()
            .with_fixint_encoding()
            .reject_trailing_bytes()
    }

    /// Reads a store.
    pub fn load(source: impl Read) -> Result<Self, ParamStoreError> {
        Self::setup_bincode()
            .deserialize_from(source)
            .map_err(Into::into)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParamStoreError> {
        Self::setup_bincode()
            .deserialize(bytes)
            .map_err(Into::into)
    }

    /// Writes the store.
    pub fn save(&self, sink: impl Write) -> Result<(), ParamStoreError> {
        Self::setup_bincode()
            .serialize_into(sink, self)
            .map_err(Into::into)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ParamStoreError> {
        Self::setup_bincode().serialize(self).map_err(Into::into)
    }

    /// True if this instance is empty.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// List the keys contained in this instance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(|s| &**s)
    }

    /// Adds the array, replacing any array of the same name.
    pub fn insert<D>(&mut self, name: impl Into<String>, array: Array<f64, D>)
    where
        D: Dimension,
    {
        self.params.insert(name.into(), array.into());
    }

    /// Removes the array of the given name.
    pub fn take<D>(&mut self, name: &str) -> Result<Array<f64, D>, ParamStoreError>
    where
        D: Dimension + TryIntoDimension,
    {
        self.params
            .remove(name)
            .ok_or_else(|| ParamStoreError::MissingParameters {
                name: name.to_owned(),
            })?
            .into_array()
    }

    /// Creates a view which prefixes all names with `scope/`.
    pub fn with_scope<'a>(&'a mut self, scope: &str) -> ScopedParamStore<'a> {
        ScopedParamStore {
            store: self,
            prefix: scope.to_owned() + "/",
        }
    }
}

/// A parameter store with a name prefix.
pub struct ScopedParamStore<'a> {
    store: &'a mut ParamStore,
    prefix: String,
}

impl<'a> ScopedParamStore<'a> {
    pub fn insert<D>(&mut self, name: &str, array: Array<f64, D>)
    where
        D: Dimension,
    {
        self.store.insert(self.prefix.clone() + name, array);
    }

    pub fn take<D>(&mut self, name: &str) -> Result<Array<f64, D>, ParamStoreError>
    where
        D: Dimension + TryIntoDimension,
    {
        let name = self.prefix.clone() + name;
        self.store.take(&name)
    }

    pub fn with_scope(&mut self, scope: &str) -> ScopedParamStore<'_> {
        ScopedParamStore {
            store: &mut *self.store,
            prefix: self.prefix.clone() + scope + "/",
        }
    }
}
