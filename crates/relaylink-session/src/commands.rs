//! Typed board commands built on [`Session::send_command`] and
//! [`Session::send_no_return`].
//!
//! Circuit arguments are checked against the board's circuit count before
//! anything is written. Bitmask arguments use [`CircuitStatus::mask`]
//! numbering (circuit N at bit N-1); bits beyond the board are cleared.

use relaylink_frame::{
    bit_for_circuit, check_circuit, function, index_payload, pack_bits, payload_from_mask,
    PAYLOAD_LEN,
};

use crate::error::Result;
use crate::session::Session;
use crate::status::CircuitStatus;

impl Session {
    /// Read the state of every circuit.
    pub fn read_status(&self) -> Result<CircuitStatus> {
        self.exchange_status(function::READ_STATUS, [0; PAYLOAD_LEN])
    }

    /// Energize one circuit. Returns true if the board reports it open.
    pub fn open_one(&self, circuit: u8) -> Result<bool> {
        self.exchange_indexed(function::OPEN_ONE, circuit)
    }

    /// Release one circuit. Returns true if the board reports it released.
    pub fn close_one(&self, circuit: u8) -> Result<bool> {
        self.exchange_indexed(function::CLOSE_ONE, circuit).map(|open| !open)
    }

    /// Toggle one circuit. Returns its new state (true = open).
    pub fn flip_one(&self, circuit: u8) -> Result<bool> {
        self.exchange_indexed(function::FLIP_ONE, circuit)
    }

    /// Energize every circuit.
    pub fn open_all(&self) -> Result<CircuitStatus> {
        self.exchange_status(function::RUN_BITMASK, self.all_payload()?)
    }

    /// Release every circuit.
    pub fn close_all(&self) -> Result<CircuitStatus> {
        self.exchange_status(function::RUN_BITMASK, [0; PAYLOAD_LEN])
    }

    /// Set every circuit at once from a wire-order sequence (highest
    /// circuit first), as accepted by [`relaylink_frame::pack_bits`].
    pub fn run_bitmask(&self, values: &[bool]) -> Result<CircuitStatus> {
        let payload = pack_bits(values, self.circuit_count())?;
        self.exchange_status(function::RUN_BITMASK, payload)
    }

    /// Energize the circuits set in `mask`, leaving the others alone.
    pub fn open_group(&self, mask: u32) -> Result<CircuitStatus> {
        let payload = self.mask_payload(mask)?;
        self.exchange_status(function::OPEN_GROUP, payload)
    }

    /// Release the circuits set in `mask`, leaving the others alone.
    pub fn close_group(&self, mask: u32) -> Result<CircuitStatus> {
        let payload = self.mask_payload(mask)?;
        self.exchange_status(function::CLOSE_GROUP, payload)
    }

    /// Toggle the circuits set in `mask`.
    pub fn flip_group(&self, mask: u32) -> Result<CircuitStatus> {
        let payload = self.mask_payload(mask)?;
        self.exchange_status(function::FLIP_GROUP, payload)
    }

    pub fn open_one_no_return(&self, circuit: u8) -> Result<()> {
        self.send_indexed(function::OPEN_ONE_NO_RETURN, circuit)
    }

    pub fn close_one_no_return(&self, circuit: u8) -> Result<()> {
        self.send_indexed(function::CLOSE_ONE_NO_RETURN, circuit)
    }

    pub fn flip_one_no_return(&self, circuit: u8) -> Result<()> {
        self.send_indexed(function::FLIP_ONE_NO_RETURN, circuit)
    }

    pub fn open_all_no_return(&self) -> Result<()> {
        let payload = self.all_payload()?;
        self.send_no_return(function::RUN_BITMASK_NO_RETURN, payload)
    }

    pub fn close_all_no_return(&self) -> Result<()> {
        self.send_no_return(function::RUN_BITMASK_NO_RETURN, [0; PAYLOAD_LEN])
    }

    pub fn run_bitmask_no_return(&self, values: &[bool]) -> Result<()> {
        let payload = pack_bits(values, self.circuit_count())?;
        self.send_no_return(function::RUN_BITMASK_NO_RETURN, payload)
    }

    pub fn open_group_no_return(&self, mask: u32) -> Result<()> {
        let payload = self.mask_payload(mask)?;
        self.send_no_return(function::OPEN_GROUP_NO_RETURN, payload)
    }

    pub fn close_group_no_return(&self, mask: u32) -> Result<()> {
        let payload = self.mask_payload(mask)?;
        self.send_no_return(function::CLOSE_GROUP_NO_RETURN, payload)
    }

    pub fn flip_group_no_return(&self, mask: u32) -> Result<()> {
        let payload = self.mask_payload(mask)?;
        self.send_no_return(function::FLIP_GROUP_NO_RETURN, payload)
    }

    fn exchange_status(&self, code: u8, payload: [u8; PAYLOAD_LEN]) -> Result<CircuitStatus> {
        let reply = self.send_command(code, payload)?;
        CircuitStatus::from_frame(&reply, self.circuit_count())
    }

    fn exchange_indexed(&self, code: u8, circuit: u8) -> Result<bool> {
        let count = self.circuit_count();
        check_circuit(circuit, count)?;
        let reply = self.send_command(code, index_payload(circuit))?;
        Ok(bit_for_circuit(&reply, circuit, count)?)
    }

    fn send_indexed(&self, code: u8, circuit: u8) -> Result<()> {
        check_circuit(circuit, self.circuit_count())?;
        self.send_no_return(code, index_payload(circuit))
    }

    fn mask_payload(&self, mask: u32) -> Result<[u8; PAYLOAD_LEN]> {
        Ok(payload_from_mask(mask, self.circuit_count())?)
    }

    fn all_payload(&self) -> Result<[u8; PAYLOAD_LEN]> {
        self.mask_payload(u32::MAX)
    }
}
