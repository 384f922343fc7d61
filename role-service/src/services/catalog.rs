//! Static organizational policy: divisions, the functions each division
//! contains, the exclusivity rules inside a division and the delegation table
//! used by the permission query.

use std::collections::HashMap;

pub const ADMIN_PPE: &str = "Admin PPE";
pub const ADMIN_AGENCY: &str = "Admin Agency";
pub const VERIFIKATOR: &str = "Verifikator";
pub const HELPDESK: &str = "Helpdesk";
pub const PPK: &str = "PPK";
pub const KUPBJ: &str = "KUPBJ";
pub const ANGGOTA_POKMIL: &str = "Anggota Pokmil";
pub const PP: &str = "PP";
pub const AUDITOR: &str = "Auditor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Division {
    PengelolaLpse,
    PelakuPengadaanLpse,
    Auditor,
}

impl Division {
    pub const ALL: [Division; 3] = [
        Division::PengelolaLpse,
        Division::PelakuPengadaanLpse,
        Division::Auditor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Division::PengelolaLpse => "Pengelola LPSE",
            Division::PelakuPengadaanLpse => "Pelaku Pengadaan LPSE",
            Division::Auditor => "Auditor",
        }
    }

    pub fn functions(&self) -> &'static [&'static str] {
        match self {
            Division::PengelolaLpse => &[ADMIN_PPE, ADMIN_AGENCY, VERIFIKATOR, HELPDESK],
            Division::PelakuPengadaanLpse => &[PPK, KUPBJ, ANGGOTA_POKMIL, PP],
            Division::Auditor => &[AUDITOR],
        }
    }
}

impl std::fmt::Display for Division {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Two functions of one division that a user may not hold together in the
/// same organizational unit.
#[derive(Debug, Clone, Copy)]
pub struct ExclusivityRule {
    pub division: Division,
    pub first: &'static str,
    pub second: &'static str,
}

pub const EXCLUSIVITY_RULES: &[ExclusivityRule] = &[ExclusivityRule {
    division: Division::PelakuPengadaanLpse,
    first: PP,
    second: PPK,
}];

/// A function allowed to create roles in its own organizational unit, with
/// the functions it may not create. Rules are ordered by privilege; the first
/// rule whose grantor the requester holds decides.
#[derive(Debug, Clone, Copy)]
pub struct DelegationRule {
    pub grantor: &'static str,
    pub denied: &'static [&'static str],
}

pub const DELEGATION_RULES: &[DelegationRule] = &[
    DelegationRule {
        grantor: ADMIN_PPE,
        denied: &[ADMIN_PPE, AUDITOR],
    },
    DelegationRule {
        grantor: ADMIN_AGENCY,
        denied: &[ADMIN_PPE, AUDITOR, ADMIN_AGENCY],
    },
];

/// Division a function belongs to, by direct catalog lookup.
pub fn division_of(function: &str) -> Option<Division> {
    Division::ALL
        .into_iter()
        .find(|division| division.functions().contains(&function))
}

/// Reverse index from function name to division.
///
/// Built per validation run and passed down explicitly; never shared between
/// requests.
#[derive(Debug, Clone)]
pub struct FunctionIndex {
    divisions: HashMap<&'static str, Division>,
}

impl FunctionIndex {
    pub fn build() -> Self {
        let divisions = Division::ALL
            .into_iter()
            .flat_map(|division| {
                division
                    .functions()
                    .iter()
                    .map(move |function| (*function, division))
            })
            .collect();
        Self { divisions }
    }

    pub fn division_of(&self, function: &str) -> Option<Division> {
        self.divisions.get(function).copied()
    }

    pub fn len(&self) -> usize {
        self.divisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.divisions.is_empty()
    }
}
