use indicatif::ProgressBar;
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;

use super::{engine::GeometryEngine, error::GeometryError};

/// A merged region produced by `dissolve`.
#[derive(Debug, Clone, PartialEq)]
pub struct DissolvedPolygon {
    pub id: i64,
    pub geometry: geo::Polygon,
}

/// Merge all polygons that touch or overlap into maximal connected regions.
///
/// Every input is repaired first. Inputs sharing any point are grouped with a union-find, groups are ordered by
/// their lowest input index and unioned independently. Each disjoint polygon of a group union becomes one output
/// region; ids count up from 0 in output order. Input attributes do not survive.
pub fn dissolve<E: GeometryEngine>(
    engine: &E,
    geometries: &[geo::Geometry],
    progress: &ProgressBar,
) -> Result<Vec<DissolvedPolygon>, GeometryError> {
    let repaired: Vec<geo::MultiPolygon> = geometries
        .par_iter()
        .enumerate()
        .map(|(index, geometry)| {
            engine
                .repair(geometry)
                .map_err(|source| GeometryError::Repair { index, source })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect::<Result<_, _>>()?;

    let groups = touching_groups(engine, &repaired, progress);
    log::debug!(
        "{} geometries form {} connected groups",
        repaired.len(),
        groups.len()
    );

    let group_unions: Vec<Vec<geo::Polygon>> = groups
        .par_iter()
        .map(|members| {
            let member_geometries: Vec<geo::MultiPolygon> = members
                .iter()
                .map(|&index| repaired[index].clone())
                .collect();
            engine.components_of(engine.union(&member_geometries))
        })
        .collect();

    Ok(group_unions
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(id, geometry)| DissolvedPolygon {
            id: id as i64,
            geometry,
        })
        .collect())
}

/// Indices of mutually connected geometries, each group sorted, groups ordered by their first index.
fn touching_groups<E: GeometryEngine>(
    engine: &E,
    geometries: &[geo::MultiPolygon],
    progress: &ProgressBar,
) -> Vec<Vec<usize>> {
    let num_geometries = geometries.len();
    progress.set_length(num_geometries as u64);
    let edges: Vec<(usize, usize)> = (0..num_geometries)
        .into_par_iter()
        .flat_map_iter(|i| {
            let row: Vec<(usize, usize)> = ((i + 1)..num_geometries)
                .filter(|&j| engine.intersects(&geometries[i], &geometries[j]))
                .map(|j| (i, j))
                .collect();
            progress.inc(1);
            row
        })
        .collect();
    progress.finish_and_clear();

    let mut union_find = UnionFind::<usize>::new(num_geometries);
    for (i, j) in edges {
        union_find.union(i, j);
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    // Position in `groups` of each union-find root.
    let mut group_of_root: Vec<Option<usize>> = vec![None; num_geometries];
    for (index, root) in union_find.into_labeling().into_iter().enumerate() {
        match group_of_root[root] {
            Some(group) => groups[group].push(index),
            None => {
                group_of_root[root] = Some(groups.len());
                groups.push(vec![index]);
            }
        }
    }
    groups
}
