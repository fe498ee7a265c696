//! Mnemonic table of the controller (manual p. 85).
//!
//! Commands are built from the constants below, so an unknown mnemonic cannot
//! reach the wire; [`lookup`] exists for names that arrive as text.

use serde::Serialize;

/// How the payload returned on enquiry is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponseShape {
    /// Fire and forget, no enquiry is sent.
    None,
    Int,
    IntPair,
    StatusPressure,
    Bitmask,
    /// Passed through undecoded.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mnemonic {
    /// Three letters; a trailing `x` stands for a channel number.
    pub name: &'static str,
    pub description: &'static str,
    /// Page of the manual describing the command.
    pub page: u16,
    pub per_channel: bool,
    pub parameterized: bool,
    pub response: ResponseShape,
}

macro_rules! mnemonic {
    ($ident:ident, $name:literal, $desc:literal, $page:literal, $per_channel:literal, $param:literal, $shape:ident) => {
        pub const $ident: Mnemonic = Mnemonic {
            name: $name,
            description: $desc,
            page: $page,
            per_channel: $per_channel,
            parameterized: $param,
            response: ResponseShape::$shape,
        };
    };
}

mnemonic!(BAU, "BAU", "Baud rate", 95, false, true, Int);
mnemonic!(CAX, "CAx", "Calibration factor sensor x", 92, true, true, Text);
mnemonic!(CID, "CID", "Measurement point names", 88, false, true, Text);
mnemonic!(DCB, "DCB", "Display control bargraph", 89, false, true, Int);
mnemonic!(DCC, "DCC", "Display control contrast", 90, false, true, Int);
mnemonic!(DCD, "DCD", "Display digits", 88, false, true, Int);
mnemonic!(DCS, "DCS", "Display control screensave", 90, false, true, Int);
mnemonic!(DGS, "DGS", "Degas", 93, false, true, Text);
mnemonic!(ERR, "ERR", "Error status", 97, false, false, IntPair);
mnemonic!(FIL, "FIL", "Filter time constant", 92, false, true, Text);
mnemonic!(FSR, "FSR", "Full scale range of linear sensors", 93, false, true, Text);
mnemonic!(LOC, "LOC", "Parameter setup lock", 91, false, true, Int);
mnemonic!(NAD, "NAD", "Node (device) address for RS485", 96, false, true, Int);
mnemonic!(OFC, "OFC", "Offset correction", 93, false, true, Text);
mnemonic!(PNR, "PNR", "Program number", 98, false, false, Text);
mnemonic!(PRX, "PRx", "Status, pressure sensor x", 88, true, false, StatusPressure);
mnemonic!(PUC, "PUC", "Underrange control", 91, false, true, Text);
mnemonic!(RSX, "RSX", "Interface", 94, false, true, Int);
mnemonic!(SAV, "SAV", "Save default", 94, false, true, None);
mnemonic!(SCX, "SCx", "Sensor control", 87, true, true, Text);
mnemonic!(SEN, "SEN", "Sensor on/off", 86, false, true, Text);
mnemonic!(SPX, "SPx", "Set point control source for relay x", 90, true, true, Text);
mnemonic!(SPS, "SPS", "Set point status", 91, false, false, Text);
mnemonic!(TAI, "TAI", "Test A/D converter identification inputs", 100, false, false, Text);
mnemonic!(TAS, "TAS", "Test A/D converter measurement value inputs", 100, false, false, Text);
mnemonic!(TDI, "TDI", "Display test", 98, false, true, Text);
mnemonic!(TEE, "TEE", "EEPROM test", 100, false, false, Text);
mnemonic!(TEP, "TEP", "EPROM test", 99, false, false, Text);
mnemonic!(TID, "TID", "Sensor identification", 101, false, false, Text);
mnemonic!(TKB, "TKB", "Keyboard test", 99, false, false, Bitmask);
mnemonic!(TRA, "TRA", "RAM test", 99, false, false, Text);
mnemonic!(UNI, "UNI", "Unit of measurement (pressure)", 89, false, true, Int);
mnemonic!(WDT, "WDT", "Watchdog and system error control", 101, false, true, Int);

pub static MNEMONICS: &[Mnemonic] = &[
    BAU, CAX, CID, DCB, DCC, DCD, DCS, DGS, ERR, FIL, FSR, LOC, NAD, OFC, PNR, PRX, PUC, RSX,
    SAV, SCX, SEN, SPX, SPS, TAI, TAS, TDI, TEE, TEP, TID, TKB, TRA, UNI, WDT,
];

/// Resolve a mnemonic by name. Channel forms such as `PR3` resolve to `PRx`.
pub fn lookup(name: &str) -> Option<&'static Mnemonic> {
    let name = name.trim().to_ascii_uppercase();
    MNEMONICS.iter().find(|m| {
        if m.per_channel {
            let prefix = &m.name[..m.name.len() - 1];
            name.len() == m.name.len()
                && name.starts_with(&prefix.to_ascii_uppercase())
                && name[prefix.len()..].chars().all(|c| c.is_ascii_digit())
        } else {
            m.name == name
        }
    })
}

impl Mnemonic {
    /// Enquiries needed to collect the response.
    pub fn enquiries(&self) -> usize {
        match self.response {
            ResponseShape::None => 0,
            _ => 1,
        }
    }
}

/// One command line, e.g. `PR1` or `DCC,10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    mnemonic: &'static Mnemonic,
    channel: Option<u8>,
    params: Vec<String>,
}

impl Command {
    pub fn new(mnemonic: &'static Mnemonic) -> Self {
        debug_assert!(!mnemonic.per_channel, "{} needs a channel", mnemonic.name);
        Self {
            mnemonic,
            channel: None,
            params: Vec::new(),
        }
    }

    pub fn for_channel(mnemonic: &'static Mnemonic, channel: u8) -> Self {
        debug_assert!(mnemonic.per_channel, "{} takes no channel", mnemonic.name);
        Self {
            mnemonic,
            channel: Some(channel),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl ToString) -> Self {
        debug_assert!(self.mnemonic.parameterized, "{} takes no parameters", self.mnemonic.name);
        self.params.push(param.to_string());
        self
    }

    /// Parse a textual command such as `DCC,10` or `PR2`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.trim().split(',');
        let head = fields.next()?.trim().to_ascii_uppercase();
        let mnemonic = lookup(&head)?;
        let channel = if mnemonic.per_channel {
            Some(head[mnemonic.name.len() - 1..].parse().ok()?)
        } else {
            None
        };
        let params: Vec<String> = fields.map(|f| f.trim().to_string()).collect();
        if !params.is_empty() && !mnemonic.parameterized {
            return None;
        }
        Some(Self {
            mnemonic,
            channel,
            params,
        })
    }

    pub fn mnemonic(&self) -> &'static Mnemonic {
        self.mnemonic
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn enquiries(&self) -> usize {
        self.mnemonic.enquiries()
    }

    /// Wire text, without the line terminator.
    pub fn encode(&self) -> String {
        let mut line = match self.channel {
            Some(channel) => format!("{}{}", &self.mnemonic.name[..self.mnemonic.name.len() - 1], channel),
            None => self.mnemonic.name.to_string(),
        };
        for param in &self.params {
            line.push(',');
            line.push_str(param);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(Command::for_channel(&PRX, 1).encode(), "PR1");
        assert_eq!(Command::new(&DCC).encode(), "DCC");
        assert_eq!(Command::new(&DCC).with_param(10).encode(), "DCC,10");
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("TKB").map(|m| m.response), Some(ResponseShape::Bitmask));
        assert_eq!(lookup("pr4").map(|m| m.name), Some("PRx"));
        assert_eq!(lookup("ERR").map(|m| m.response), Some(ResponseShape::IntPair));
        assert!(lookup("XYZ").is_none());
        assert!(lookup("PR").is_none());
    }

    #[test]
    fn test_parse() {
        let cmd = Command::parse("DCC, 15").unwrap();
        assert_eq!(cmd.mnemonic().name, "DCC");
        assert_eq!(cmd.encode(), "DCC,15");

        let cmd = Command::parse("PR6").unwrap();
        assert_eq!(cmd.encode(), "PR6");
        assert_eq!(cmd.enquiries(), 1);

        assert!(Command::parse("PNR,1").is_none());
        assert!(Command::parse("FOO").is_none());
    }

    #[test]
    fn test_table_names_unique() {
        let mut names: Vec<&str> = MNEMONICS.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MNEMONICS.len());
        assert!(MNEMONICS.iter().all(|m| m.name.len() == 3));
        assert_eq!(SAV.enquiries(), 0);
    }
}
