use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

/// Number of bits reserved for the rotamer index and, separately, for the cardinality in a
/// packed element key when the producer does not specify its own width.
pub const DEFAULT_ROTAMER_BITS: u32 = 4;

/// The rotamer cardinalities the solver services.
///
/// Each variant owns one node store; the derived ordering (`Singleton < Triple`) is the
/// canonical ordering used when an edge's endpoints are sorted into an edge class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cardinality {
    Singleton,
    Triple,
}

impl Cardinality {
    pub fn from_n_rot(n_rot: u32) -> Option<Self> {
        match n_rot {
            1 => Some(Self::Singleton),
            3 => Some(Self::Triple),
            _ => None,
        }
    }

    #[inline]
    pub const fn n_rot(self) -> usize {
        match self {
            Self::Singleton => 1,
            Self::Triple => 3,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-state", self.n_rot())
    }
}

/// The raw composite identity of a bead as reported by the interaction graph.
///
/// Fields are still unvalidated: `n_rot` may be a cardinality the solver does not support and
/// `rotamer` may exceed it. [`ElementTable::decode`] performs the validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementKey {
    pub residue: u32,
    pub n_rot: u32,
    pub rotamer: u32,
}

impl ElementKey {
    pub fn new(residue: u32, n_rot: u32, rotamer: u32) -> Self {
        Self {
            residue,
            n_rot,
            rotamer,
        }
    }

    /// Splits a packed key: rotamer in the low `rotamer_bits`, cardinality in the next
    /// `rotamer_bits`, residue id in the remaining high bits.
    pub fn unpack(packed: u32, rotamer_bits: u32) -> Self {
        let selector = (1u32 << rotamer_bits) - 1;
        Self {
            rotamer: packed & selector,
            n_rot: (packed >> rotamer_bits) & selector,
            residue: packed >> (2 * rotamer_bits),
        }
    }

    /// Inverse of [`unpack`](Self::unpack). `None` when a field does not fit its bits: the
    /// residue id gets `32 - 2 * rotamer_bits` of them.
    pub fn pack(&self, rotamer_bits: u32) -> Option<u32> {
        let residue_shift = rotamer_bits.checked_mul(2)?;
        let residue_bits = u32::BITS.checked_sub(residue_shift)?;
        let fits = |value: u32, bits: u32| bits >= u32::BITS || value >> bits == 0;
        if !(fits(self.rotamer, rotamer_bits)
            && fits(self.n_rot, rotamer_bits)
            && fits(self.residue, residue_bits))
        {
            return None;
        }
        // a full-width shift only happens when the residue field is empty and so zero
        let residue = self.residue.checked_shl(residue_shift).unwrap_or(0);
        Some(residue | (self.n_rot << rotamer_bits) | self.rotamer)
    }
}

/// A validated element: which node store it lives in, which node of that store, which state
/// of that node it represents, and which position index its external data lives at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub cardinality: Cardinality,
    pub node: usize,
    pub rotamer: usize,
    pub position: usize,
}

impl Element {
    #[inline]
    pub fn residue(&self) -> ResidueRef {
        ResidueRef {
            cardinality: self.cardinality,
            node: self.node,
        }
    }
}

/// Identifies one residue-like variable: a node within the store of its cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueRef {
    pub cardinality: Cardinality,
    pub node: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("Element {element} declares unsupported rotamer count {n_rot}")]
    UnsupportedCardinality { element: usize, n_rot: u32 },

    #[error("Element {element} has rotamer index {rotamer} but only {n_rot} rotamers")]
    InvalidRotamer {
        element: usize,
        rotamer: u32,
        n_rot: u32,
    },

    #[error("Expected {expected} residues but found {found} with a rotamer-0 element")]
    ResidueCountMismatch { expected: usize, found: usize },
}

/// Every element of the interaction graph, decoded once at construction.
///
/// Residue ids are renumbered per cardinality class into dense node indices in ascending id
/// order, so ids that are already dense keep their value.
#[derive(Debug, Clone, Default)]
pub struct ElementTable {
    elements: Vec<Element>,
    n_single: usize,
    n_triple: usize,
    residue_order: Vec<ResidueRef>,
}

impl ElementTable {
    pub fn decode<I>(entries: I) -> Result<Self, ElementError>
    where
        I: IntoIterator<Item = (ElementKey, usize)>,
    {
        let mut validated = Vec::new();
        let mut residue_ids: BTreeMap<Cardinality, BTreeSet<u32>> = BTreeMap::new();

        for (element, (key, position)) in entries.into_iter().enumerate() {
            let cardinality =
                Cardinality::from_n_rot(key.n_rot).ok_or(ElementError::UnsupportedCardinality {
                    element,
                    n_rot: key.n_rot,
                })?;
            if key.rotamer >= key.n_rot {
                return Err(ElementError::InvalidRotamer {
                    element,
                    rotamer: key.rotamer,
                    n_rot: key.n_rot,
                });
            }
            residue_ids
                .entry(cardinality)
                .or_default()
                .insert(key.residue);
            validated.push((cardinality, key, position));
        }

        let dense_index: BTreeMap<(Cardinality, u32), usize> = residue_ids
            .iter()
            .flat_map(|(&cardinality, ids)| {
                ids.iter()
                    .enumerate()
                    .map(move |(node, &id)| ((cardinality, id), node))
            })
            .collect();

        let elements: Vec<Element> = validated
            .into_iter()
            .map(|(cardinality, key, position)| Element {
                cardinality,
                node: dense_index[&(cardinality, key.residue)],
                rotamer: key.rotamer as usize,
                position,
            })
            .collect();

        let count = |c: Cardinality| residue_ids.get(&c).map_or(0, BTreeSet::len);
        let n_single = count(Cardinality::Singleton);
        let n_triple = count(Cardinality::Triple);

        let mut seen = HashSet::new();
        let residue_order: Vec<ResidueRef> = elements
            .iter()
            .filter(|e| e.rotamer == 0)
            .map(Element::residue)
            .filter(|r| seen.insert(*r))
            .collect();

        if residue_order.len() != n_single + n_triple {
            return Err(ElementError::ResidueCountMismatch {
                expected: n_single + n_triple,
                found: residue_order.len(),
            });
        }

        Ok(Self {
            elements,
            n_single,
            n_triple,
            residue_order,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub fn get(&self, element: usize) -> Option<&Element> {
        self.elements.get(element)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn n_nodes(&self, cardinality: Cardinality) -> usize {
        match cardinality {
            Cardinality::Singleton => self.n_single,
            Cardinality::Triple => self.n_triple,
        }
    }

    /// Residues in order of first appearance of their rotamer-0 element.
    pub fn residue_order(&self) -> &[ResidueRef] {
        &self.residue_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(keys: &[(u32, u32, u32)]) -> Result<ElementTable, ElementError> {
        ElementTable::decode(
            keys.iter()
                .enumerate()
                .map(|(i, &(res, n_rot, rot))| (ElementKey::new(res, n_rot, rot), i)),
        )
    }

    #[test]
    fn unpack_splits_fields_at_the_rotamer_bit_width() {
        let packed = (7 << 8) | (3 << 4) | 2;
        let key = ElementKey::unpack(packed, 4);
        assert_eq!(key, ElementKey::new(7, 3, 2));
    }

    #[test]
    fn pack_is_inverse_of_unpack() {
        let key = ElementKey::new(1234, 3, 1);
        assert_eq!(ElementKey::unpack(key.pack(2).unwrap(), 2), key);
    }

    #[test]
    fn pack_rejects_fields_wider_than_their_bits() {
        assert_eq!(ElementKey::new(1 << 24, 3, 0).pack(4), None);
        assert_eq!(ElementKey::new((1 << 24) - 1, 3, 0).pack(4), Some(0xffff_ff30));
        assert_eq!(ElementKey::new(0, 3, 4).pack(2), None);
        assert_eq!(ElementKey::new(0, 1, 0).pack(40), None);
        assert_eq!(ElementKey::new(4, 1, 0).pack(16), None);
        assert_eq!(ElementKey::new(0, 1, 0).pack(16), Some(1 << 16));
    }

    #[test]
    fn cardinality_maps_only_supported_counts() {
        assert_eq!(Cardinality::from_n_rot(1), Some(Cardinality::Singleton));
        assert_eq!(Cardinality::from_n_rot(3), Some(Cardinality::Triple));
        assert_eq!(Cardinality::from_n_rot(0), None);
        assert_eq!(Cardinality::from_n_rot(2), None);
        assert!(Cardinality::Singleton < Cardinality::Triple);
    }

    #[test]
    fn decode_numbers_residues_densely_per_class() {
        let decoded = table(&[
            (10, 3, 0),
            (10, 3, 1),
            (10, 3, 2),
            (4, 1, 0),
            (2, 3, 0),
            (2, 3, 1),
            (2, 3, 2),
        ])
        .unwrap();

        assert_eq!(decoded.len(), 7);
        assert_eq!(decoded.n_nodes(Cardinality::Triple), 2);
        assert_eq!(decoded.n_nodes(Cardinality::Singleton), 1);
        assert_eq!(decoded.get(0).unwrap().node, 1);
        assert_eq!(decoded.get(3).unwrap().node, 0);
        assert_eq!(decoded.get(4).unwrap().node, 0);
        assert_eq!(decoded.get(5).unwrap().rotamer, 1);
        assert_eq!(decoded.get(6).unwrap().position, 6);
    }

    #[test]
    fn decode_orders_residues_by_first_rotamer_zero_element() {
        let decoded = table(&[(5, 1, 0), (0, 3, 1), (0, 3, 0), (0, 3, 2), (5, 1, 0)]).unwrap();
        assert_eq!(
            decoded.residue_order(),
            &[
                ResidueRef {
                    cardinality: Cardinality::Singleton,
                    node: 0
                },
                ResidueRef {
                    cardinality: Cardinality::Triple,
                    node: 0
                },
            ]
        );
    }

    #[test]
    fn decode_rejects_rotamer_beyond_cardinality() {
        let err = table(&[(0, 3, 3)]).unwrap_err();
        assert_eq!(
            err,
            ElementError::InvalidRotamer {
                element: 0,
                rotamer: 3,
                n_rot: 3
            }
        );
    }

    #[test]
    fn decode_rejects_unsupported_cardinalities() {
        assert!(matches!(
            table(&[(0, 0, 0)]),
            Err(ElementError::UnsupportedCardinality { n_rot: 0, .. })
        ));
        assert!(matches!(
            table(&[(0, 3, 0), (1, 2, 1)]),
            Err(ElementError::UnsupportedCardinality {
                element: 1,
                n_rot: 2
            })
        ));
    }

    #[test]
    fn decode_rejects_residue_without_rotamer_zero_element() {
        let err = table(&[(0, 3, 0), (1, 3, 1), (1, 3, 2)]).unwrap_err();
        assert_eq!(
            err,
            ElementError::ResidueCountMismatch {
                expected: 2,
                found: 1
            }
        );
    }
}
