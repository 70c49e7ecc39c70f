//! The suite registry: which ROMs get run, in which mode, and in what order.
//!
//! The built-in catalog is a plain data table. Adding, removing or commenting
//! out an entry in [`BUILTIN_SUITES`] is the whole change needed to alter
//! coverage. A registry can also be loaded from a YAML/JSON catalog file or
//! built directly from [`TestSuite`] values (tests use this to substitute
//! fake suites).

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

// =============================================================================
// CORE TYPES
// =============================================================================

/// Verification mode the external runner should use for a ROM.
///
/// The harness treats this as an opaque argument; only the runner knows what
/// each mode means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    /// Result is read back from cartridge RAM.
    Memory,
    /// Result is printed over the serial port.
    Serial,
}

impl SuiteKind {
    /// The argument string passed to the runner.
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteKind::Memory => "memory",
            SuiteKind::Serial => "serial",
        }
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(SuiteKind::Memory),
            "serial" => Ok(SuiteKind::Serial),
            other => Err(format!("unknown suite kind `{other}` (expected memory or serial)")),
        }
    }
}

/// A named group of ROM executions sharing a kind and a report bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSuite {
    pub name: String,
    pub kind: SuiteKind,
    pub primary_rom: String,
    pub individual_roms: Vec<String>,
}

impl TestSuite {
    pub fn new(
        name: impl Into<String>,
        kind: SuiteKind,
        primary_rom: impl Into<String>,
        individual_roms: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_rom: primary_rom.into(),
            individual_roms,
        }
    }

    /// ROMs actually executed for this suite: the individual ROMs when there
    /// are any, otherwise just the primary ROM.
    pub fn working_set(&self) -> &[String] {
        if self.individual_roms.is_empty() {
            std::slice::from_ref(&self.primary_rom)
        } else {
            &self.individual_roms
        }
    }

    /// Number of cases the suite reports. Never zero.
    pub fn total_cases(&self) -> usize {
        self.individual_roms.len().max(1)
    }
}

/// Literal catalog entry. Kept `'static` so the built-in table is pure data.
#[derive(Debug, Clone, Copy)]
pub struct SuiteSpec {
    pub name: &'static str,
    pub kind: SuiteKind,
    pub rom: &'static str,
    pub individual: &'static [&'static str],
}

impl From<&SuiteSpec> for TestSuite {
    fn from(spec: &SuiteSpec) -> Self {
        TestSuite::new(
            spec.name,
            spec.kind,
            spec.rom,
            spec.individual.iter().map(|s| s.to_string()).collect(),
        )
    }
}

// =============================================================================
// BUILT-IN CATALOG
// =============================================================================

/// Blargg's Game Boy test ROMs, in report order.
pub const BUILTIN_SUITES: &[SuiteSpec] = &[
    SuiteSpec {
        name: "halt_bug",
        kind: SuiteKind::Memory,
        rom: "../gb-test-roms/halt_bug.gb",
        individual: &[],
    },
    SuiteSpec {
        name: "mem_timing-2",
        kind: SuiteKind::Memory,
        rom: "../gb-test-roms/mem_timing-2/mem_timing.gb",
        individual: &[
            "../gb-test-roms/mem_timing-2/rom_singles/03-modify_timing.gb",
            "../gb-test-roms/mem_timing-2/rom_singles/02-write_timing.gb",
            "../gb-test-roms/mem_timing-2/rom_singles/01-read_timing.gb",
        ],
    },
    SuiteSpec {
        name: "instr_timing",
        kind: SuiteKind::Serial,
        rom: "../gb-test-roms/instr_timing/instr_timing.gb",
        individual: &[],
    },
    SuiteSpec {
        name: "oam_bug",
        kind: SuiteKind::Memory,
        rom: "../gb-test-roms/oam_bug/oam_bug.gb",
        individual: &[
            "../gb-test-roms/oam_bug/rom_singles/4-scanline_timing.gb",
            "../gb-test-roms/oam_bug/rom_singles/2-causes.gb",
            "../gb-test-roms/oam_bug/rom_singles/3-non_causes.gb",
            "../gb-test-roms/oam_bug/rom_singles/7-timing_effect.gb",
            "../gb-test-roms/oam_bug/rom_singles/1-lcd_sync.gb",
            "../gb-test-roms/oam_bug/rom_singles/8-instr_effect.gb",
            "../gb-test-roms/oam_bug/rom_singles/5-timing_bug.gb",
            "../gb-test-roms/oam_bug/rom_singles/6-timing_no_bug.gb",
        ],
    },
    SuiteSpec {
        name: "dmg_sound",
        kind: SuiteKind::Memory,
        rom: "../gb-test-roms/dmg_sound/dmg_sound.gb",
        individual: &[
            "../gb-test-roms/dmg_sound/rom_singles/07-len sweep period sync.gb",
            "../gb-test-roms/dmg_sound/rom_singles/11-regs after power.gb",
            "../gb-test-roms/dmg_sound/rom_singles/08-len ctr during power.gb",
            "../gb-test-roms/dmg_sound/rom_singles/06-overflow on trigger.gb",
            "../gb-test-roms/dmg_sound/rom_singles/03-trigger.gb",
            "../gb-test-roms/dmg_sound/rom_singles/01-registers.gb",
            "../gb-test-roms/dmg_sound/rom_singles/02-len ctr.gb",
            "../gb-test-roms/dmg_sound/rom_singles/10-wave trigger while on.gb",
            "../gb-test-roms/dmg_sound/rom_singles/09-wave read while on.gb",
            "../gb-test-roms/dmg_sound/rom_singles/12-wave write while on.gb",
            "../gb-test-roms/dmg_sound/rom_singles/04-sweep.gb",
            "../gb-test-roms/dmg_sound/rom_singles/05-sweep details.gb",
        ],
    },
    SuiteSpec {
        name: "cpu_instrs",
        kind: SuiteKind::Serial,
        rom: "../gb-test-roms/cpu_instrs/cpu_instrs.gb",
        individual: &[
            "../gb-test-roms/cpu_instrs/individual/05-op rp.gb",
            "../gb-test-roms/cpu_instrs/individual/10-bit ops.gb",
            "../gb-test-roms/cpu_instrs/individual/02-interrupts.gb",
            "../gb-test-roms/cpu_instrs/individual/08-misc instrs.gb",
            "../gb-test-roms/cpu_instrs/individual/01-special.gb",
            "../gb-test-roms/cpu_instrs/individual/06-ld r,r.gb",
            "../gb-test-roms/cpu_instrs/individual/09-op r,r.gb",
            "../gb-test-roms/cpu_instrs/individual/03-op sp,hl.gb",
            "../gb-test-roms/cpu_instrs/individual/04-op r,imm.gb",
            "../gb-test-roms/cpu_instrs/individual/11-op a,(hl).gb",
            "../gb-test-roms/cpu_instrs/individual/07-jr,jp,call,ret,rst.gb",
        ],
    },
    // Disabled: the emulator has no CGB mode yet.
    // SuiteSpec {
    //     name: "cgb_sound",
    //     kind: SuiteKind::Memory,
    //     rom: "../gb-test-roms/cgb_sound/cgb_sound.gb",
    //     individual: &[
    //         "../gb-test-roms/cgb_sound/rom_singles/07-len sweep period sync.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/11-regs after power.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/08-len ctr during power.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/06-overflow on trigger.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/03-trigger.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/12-wave.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/01-registers.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/02-len ctr.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/10-wave trigger while on.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/09-wave read while on.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/04-sweep.gb",
    //         "../gb-test-roms/cgb_sound/rom_singles/05-sweep details.gb",
    //     ],
    // },
    SuiteSpec {
        name: "interrupt_time",
        kind: SuiteKind::Serial,
        rom: "../gb-test-roms/interrupt_time/interrupt_time.gb",
        individual: &[],
    },
    SuiteSpec {
        name: "mem_timing",
        kind: SuiteKind::Serial,
        rom: "../gb-test-roms/mem_timing/mem_timing.gb",
        individual: &[
            "../gb-test-roms/mem_timing/individual/03-modify_timing.gb",
            "../gb-test-roms/mem_timing/individual/02-write_timing.gb",
            "../gb-test-roms/mem_timing/individual/01-read_timing.gb",
        ],
    },
];

// =============================================================================
// REGISTRY
// =============================================================================

/// Ordered, immutable collection of suites handed to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteRegistry {
    suites: Vec<TestSuite>,
}

/// One entry of a catalog file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteEntry {
    name: String,
    kind: SuiteKind,
    rom: String,
    #[serde(default)]
    individual: Vec<String>,
}

impl SuiteRegistry {
    /// Builds a registry from explicit suites after validating them.
    pub fn new(suites: Vec<TestSuite>) -> Result<Self> {
        validate(&suites)?;
        Ok(Self { suites })
    }

    /// The compiled-in catalog.
    pub fn builtin() -> Self {
        Self {
            suites: BUILTIN_SUITES.iter().map(TestSuite::from).collect(),
        }
    }

    /// Loads a catalog file. `.json` files are read as JSON, everything else
    /// as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::SuiteFile {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let entries: Vec<SuiteEntry> = if is_json {
            serde_json::from_str(&content).map_err(|e| parse_error(path, e))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| parse_error(path, e))?
        };
        let suites = entries
            .into_iter()
            .map(|e| TestSuite::new(e.name, e.kind, e.rom, e.individual))
            .collect();
        Self::new(suites)
    }

    /// `listSuites()`: the suites in declaration order.
    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    /// Keeps only suites whose name contains `needle` (case-insensitive).
    pub fn filtered(&self, needle: &str) -> Self {
        let needle = needle.to_lowercase();
        Self {
            suites: self
                .suites
                .iter()
                .filter(|s| s.name.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        }
    }
}

fn parse_error(path: &Path, e: impl fmt::Display) -> HarnessError {
    HarnessError::SuiteFileParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn validate(suites: &[TestSuite]) -> Result<()> {
    let mut seen = HashSet::new();
    for suite in suites {
        let invalid = |reason: &str| HarnessError::InvalidSuite {
            name: suite.name.clone(),
            reason: reason.to_string(),
        };
        if suite.name.trim().is_empty() {
            return Err(invalid("suite name is empty"));
        }
        if suite.primary_rom.trim().is_empty() {
            return Err(invalid("primary ROM path is empty"));
        }
        if suite.individual_roms.iter().any(|r| r.trim().is_empty()) {
            return Err(invalid("individual ROM path is empty"));
        }
        if !seen.insert(suite.name.as_str()) {
            return Err(invalid("duplicate suite name"));
        }
    }
    Ok(())
}
