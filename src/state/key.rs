use crate::prelude::SV;

/// Discriminant of one estimated parameter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateType {
    /// Satellite clock bias (m)
    SatClock,
    /// Satellite clock drift (m.s⁻¹)
    SatClockRate,
    /// Gauss-Markov twin of the satellite clock drift
    SatClockRateGm,
    /// Receiver position axis (ECEF, m)
    RecPosition,
    /// Troposphere: wet zenith delay (index 0) and the two
    /// horizontal gradients (indices 1, 2), in meters
    Tropo,
    /// Gauss-Markov twin of a troposphere state
    TropoGm,
    /// Carrier phase ambiguity (m), per receiver/satellite/frequency
    Ambiguity,
    /// Receiver clock or inter-system bias (m), per bias group
    RecSysBias,
    /// Receiver clock drift (m.s⁻¹)
    RecSysBiasRate,
    /// Gauss-Markov twin of the receiver clock drift
    RecSysBiasRateGm,
    /// Reference system bias datum, anchored on the pivot receiver
    RefSysBias,
    /// Ionosphere slant delay (STEC), per receiver/satellite
    IonoStec,
    /// Earth orientation parameter (pole mas, UT1 ms)
    Eop,
    /// Earth orientation parameter rate (per day)
    EopRate,
    /// Satellite orbit correction coefficient
    OrbitCorrection,
}

/// [StateKey] identifies one scalar unknown of the network filter.
/// Two keys with identical (type, sv, receiver, index, label) address
/// the same filter slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// Parameter family
    pub state_type: StateType,
    /// Satellite identity, when the parameter is satellite specific
    pub sv: Option<SV>,
    /// Receiver identity, when the parameter is receiver specific
    pub receiver: Option<String>,
    /// Axis, frequency, bias group or constituent index
    pub index: u16,
    /// Free text label (EOP axis, orbit unknown name)
    pub label: Option<String>,
}

impl StateKey {
    fn new(state_type: StateType) -> Self {
        Self {
            state_type,
            sv: None,
            receiver: None,
            index: 0,
            label: None,
        }
    }

    /// Satellite clock bias key
    pub fn sat_clock(sv: SV) -> Self {
        let mut key = Self::new(StateType::SatClock);
        key.sv = Some(sv);
        key
    }

    /// Satellite clock drift key
    pub fn sat_clock_rate(sv: SV) -> Self {
        let mut key = Self::new(StateType::SatClockRate);
        key.sv = Some(sv);
        key
    }

    /// Gauss-Markov satellite clock drift key
    pub fn sat_clock_rate_gm(sv: SV) -> Self {
        let mut key = Self::new(StateType::SatClockRateGm);
        key.sv = Some(sv);
        key
    }

    /// Receiver position key for given axis (0, 1, 2)
    pub fn rec_position(receiver: &str, axis: u16) -> Self {
        let mut key = Self::new(StateType::RecPosition);
        key.receiver = Some(receiver.to_string());
        key.index = axis;
        key
    }

    /// Troposphere key: index 0 is the wet zenith delay,
    /// indices 1 and 2 the horizontal gradients.
    pub fn tropo(receiver: &str, index: u16) -> Self {
        let mut key = Self::new(StateType::Tropo);
        key.receiver = Some(receiver.to_string());
        key.index = index;
        key
    }

    /// Gauss-Markov troposphere twin key
    pub fn tropo_gm(receiver: &str, index: u16) -> Self {
        let mut key = Self::new(StateType::TropoGm);
        key.receiver = Some(receiver.to_string());
        key.index = index;
        key
    }

    /// Phase ambiguity key, per receiver/satellite/frequency
    pub fn ambiguity(sv: SV, receiver: &str, frequency: u16) -> Self {
        let mut key = Self::new(StateType::Ambiguity);
        key.sv = Some(sv);
        key.receiver = Some(receiver.to_string());
        key.index = frequency;
        key
    }

    /// Receiver clock / inter-system bias key, per bias group
    pub fn rec_sys_bias(receiver: &str, group: u16) -> Self {
        let mut key = Self::new(StateType::RecSysBias);
        key.receiver = Some(receiver.to_string());
        key.index = group;
        key
    }

    /// Receiver clock drift key
    pub fn rec_sys_bias_rate(receiver: &str, group: u16) -> Self {
        let mut key = Self::new(StateType::RecSysBiasRate);
        key.receiver = Some(receiver.to_string());
        key.index = group;
        key
    }

    /// Gauss-Markov receiver clock drift key
    pub fn rec_sys_bias_rate_gm(receiver: &str, group: u16) -> Self {
        let mut key = Self::new(StateType::RecSysBiasRateGm);
        key.receiver = Some(receiver.to_string());
        key.index = group;
        key
    }

    /// Reference system bias datum key (pivot receiver)
    pub fn ref_sys_bias(receiver: &str, group: u16) -> Self {
        let mut key = Self::new(StateType::RefSysBias);
        key.receiver = Some(receiver.to_string());
        key.index = group;
        key
    }

    /// Ionosphere slant delay key, per receiver/satellite
    pub fn iono_stec(sv: SV, receiver: &str) -> Self {
        let mut key = Self::new(StateType::IonoStec);
        key.sv = Some(sv);
        key.receiver = Some(receiver.to_string());
        key
    }

    /// Earth orientation parameter key ("xp", "yp", "ut1")
    pub fn eop(label: &str) -> Self {
        let mut key = Self::new(StateType::Eop);
        key.label = Some(label.to_string());
        key
    }

    /// Earth orientation parameter rate key
    pub fn eop_rate(label: &str) -> Self {
        let mut key = Self::new(StateType::EopRate);
        key.label = Some(label.to_string());
        key
    }

    /// Orbit correction coefficient key, labelled per unknown
    pub fn orbit_correction(sv: SV, label: &str) -> Self {
        let mut key = Self::new(StateType::OrbitCorrection);
        key.sv = Some(sv);
        key.label = Some(label.to_string());
        key
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.state_type)?;
        if let Some(sv) = self.sv {
            write!(f, " {}", sv)?;
        }
        if let Some(receiver) = &self.receiver {
            write!(f, " {}", receiver)?;
        }
        write!(f, " #{}", self.index)?;
        if let Some(label) = &self.label {
            write!(f, " {}", label)?;
        }
        Ok(())
    }
}
