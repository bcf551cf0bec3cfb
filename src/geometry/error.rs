use thiserror::Error;

/// Reasons a single geometry cannot be turned into a valid areal geometry.
#[derive(Error, Debug, PartialEq)]
pub enum RepairError {
    #[error("{0} geometries have no area and cannot be repaired")]
    NotAreal(&'static str),

    #[error("repaired geometry has non-finite coordinates")]
    NonFinite,
}

/// Errors raised by the overlap, dissolve and within algorithms. `index` is the zero-based position of the
/// offending feature in the input sequence.
#[derive(Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("feature {index} could not be repaired: {source}")]
    Repair {
        index: usize,
        #[source]
        source: RepairError,
    },

    #[error("container could not be repaired: {source}")]
    ContainerRepair {
        #[source]
        source: RepairError,
    },

    #[error("feature {index} has zero area, overlap fraction is undefined")]
    ZeroArea { index: usize },

    #[error("feature {index} has a non-finite area")]
    NonFiniteArea { index: usize },
}
