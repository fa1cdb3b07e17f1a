// Joining constituency results with the district mapping table.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, warn};

use crate::config::*;

/// Trims and title-cases a constituency name: the first letter of every word
/// is upper case, the other letters lower case. A word starts after any
/// character that is not a letter ("BAGAHA (SC)" becomes "Bagaha (Sc)").
pub fn normalize_name(name: &str) -> String {
    let mut res = String::with_capacity(name.len());
    let mut prev_is_letter = false;
    for c in name.trim().chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                res.extend(c.to_lowercase());
            } else {
                res.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            res.push(c);
            prev_is_letter = false;
        }
    }
    res
}

/// The district mapping, indexed by constituency id and normalized name.
pub struct DistrictIndex {
    districts: HashMap<(u32, String), String>,
}

impl DistrictIndex {
    pub fn new(mapping: &[DistrictMapping]) -> DistrictIndex {
        let districts = mapping
            .iter()
            .map(|m| {
                (
                    (m.constituency_id, normalize_name(&m.constituency_name)),
                    m.district_name.clone(),
                )
            })
            .collect();
        DistrictIndex { districts }
    }

    pub fn lookup(&self, constituency_id: u32, constituency_name: &str) -> Option<&String> {
        self.districts
            .get(&(constituency_id, normalize_name(constituency_name)))
    }

    pub fn len(&self) -> usize {
        self.districts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }
}

/// Attaches the district to each row, using the normalized constituency name.
///
/// Rows without a match are kept, with no district. The constituency names of
/// the output are the normalized names.
pub fn enrich(rows: Vec<CandidateResult>, index: &DistrictIndex) -> Vec<CandidateResult> {
    let mut missed: BTreeSet<u32> = BTreeSet::new();
    let res: Vec<CandidateResult> = rows
        .into_iter()
        .map(|r| {
            let constituency_name = normalize_name(&r.constituency_name);
            let district = index.lookup(r.constituency_id, &constituency_name).cloned();
            if district.is_none() {
                missed.insert(r.constituency_id);
            }
            CandidateResult {
                constituency_name,
                district,
                ..r
            }
        })
        .collect();
    for constituency_id in missed {
        warn!(
            "enrich: no district found for constituency {}",
            constituency_id
        );
    }
    res
}

/// Recomputes the district vote totals over the given rows.
///
/// Rows without a district are not counted and get no total.
pub fn with_district_totals(rows: Vec<CandidateResult>) -> Vec<CandidateResult> {
    let mut totals: HashMap<String, u64> = HashMap::new();
    for r in rows.iter() {
        if let Some(d) = &r.district {
            *totals.entry(d.clone()).or_default() += r.votes;
        }
    }
    debug!("with_district_totals: {} districts", totals.len());
    rows.into_iter()
        .map(|r| {
            let total_votes_per_district = r.district.as_ref().and_then(|d| totals.get(d)).copied();
            CandidateResult {
                total_votes_per_district,
                ..r
            }
        })
        .collect()
}

/// Builds the mapping table from raw table cells `(district, constituency)`.
///
/// The district cell is only filled on the first row of each district and is
/// carried forward. Constituency cells look like `"12 - Valmiki Nagar"`;
/// cells without a dash or with a non-numeric id are skipped.
pub fn parse_mapping_cells(cells: &[(String, String)]) -> Vec<DistrictMapping> {
    let mut current_district: Option<String> = None;
    let mut seen: HashSet<DistrictMapping> = HashSet::new();
    let mut res: Vec<DistrictMapping> = Vec::new();
    for (district_cell, ac_cell) in cells {
        let district_cell = district_cell.trim();
        if !district_cell.is_empty() {
            current_district = Some(district_cell.to_string());
        }
        let ac_cell = ac_cell.trim();
        let (id_s, name) = match ac_cell.split_once('-') {
            Some(x) => x,
            None => continue,
        };
        let constituency_id = match id_s.trim().parse::<u32>() {
            Ok(x) => x,
            Err(_) => {
                warn!("parse_mapping_cells: skipping cell {:?}", ac_cell);
                continue;
            }
        };
        let district_name = match &current_district {
            Some(d) => d.clone(),
            None => {
                warn!("parse_mapping_cells: no district for cell {:?}", ac_cell);
                continue;
            }
        };
        let m = DistrictMapping {
            constituency_id,
            constituency_name: name.trim().to_string(),
            district_name,
        };
        if seen.insert(m.clone()) {
            res.push(m);
        }
    }
    res.sort_by_key(|m| m.constituency_id);
    res
}
