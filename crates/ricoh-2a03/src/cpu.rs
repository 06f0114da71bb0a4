//! Whole-instruction 2A03 interpreter.
//!
//! The dispatcher grants the CPU a cycle budget each scheduling round and
//! calls [`Ricoh2a03::step`] until the budget is covered. Instructions
//! never split: one that overshoots its budget still completes, and the
//! overshoot is absorbed into the next round's budget. Cycle costs come
//! from a 256-entry base table plus the page-cross and taken-branch
//! penalties accumulated while resolving the addressing mode.

use famicom_core::{Bus, Observable, Value};

use crate::Registers;
use crate::Status;
use crate::flags::{C, D, I, N, U, V, Z};

/// NMI vector.
const NMI_VECTOR: u16 = 0xFFFA;
/// Power-on / reset-button vector.
const RESET_VECTOR: u16 = 0xFFFC;
/// BRK vector (shared with IRQ on real hardware).
const BRK_VECTOR: u16 = 0xFFFE;

/// APU channel-enable register, silenced on reset.
const APU_STATUS: u16 = 0x4015;
/// APU frame-counter register, silenced on hard reset.
const APU_FRAME: u16 = 0x4017;

/// Base cycle cost per opcode. Conditional penalties (+1 page cross,
/// +1/+2 taken branch) are added during execution. Undocumented slots
/// carry placeholder values and are unreachable through the decoder.
#[rustfmt::skip]
const CYCLE_TABLE: [u8; 256] = [
    7, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 6, 7,
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 6, 7,
    6, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 3, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 6, 7,
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 5, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 6, 7,
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4,
    2, 5, 2, 6, 4, 4, 4, 4, 2, 4, 2, 5, 5, 4, 5, 5,
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4,
    2, 5, 2, 5, 4, 4, 4, 4, 2, 4, 2, 4, 4, 4, 4, 4,
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 6, 7,
    2, 6, 3, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 6, 7,
];

/// Instruction body: receives the resolved effective address.
type OpFn<B> = fn(&mut Ricoh2a03, &mut B, u16);

/// The Ricoh 2A03 CPU.
#[derive(Debug)]
pub struct Ricoh2a03 {
    /// CPU registers.
    pub regs: Registers,

    /// One-slot deferred status value. Instructions that touch the I flag
    /// park the updated status here; it lands at the next step boundary,
    /// one instruction late, matching the hardware's delayed I-flag write.
    pending_p: Option<Status>,

    /// NMI request, serviced at the next instruction boundary.
    nmi_pending: bool,

    /// Penalty cycles accumulated by the current instruction.
    extra_cycles: u8,

    /// Total cycles executed since power-on.
    total_cycles: u64,
}

impl Default for Ricoh2a03 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ricoh2a03 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            pending_p: None,
            nmi_pending: false,
            extra_cycles: 0,
            total_cycles: 0,
        }
    }

    /// Power-on reset: documented register values, audio registers
    /// silenced, PC loaded from the reset vector.
    pub fn hard_reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs = Registers::new();
        bus.write(APU_FRAME, 0x00);
        bus.write(APU_STATUS, 0x00);
        self.regs.pc = self.read_word(bus, RESET_VECTOR);
        self.pending_p = None;
        self.nmi_pending = false;
        self.total_cycles = 0;
    }

    /// Reset-button reset: S drops by 3, I forced, channel enables
    /// cleared, PC reloaded. Everything else survives.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs.s = self.regs.s.wrapping_sub(3);
        self.regs.p.set(I);
        bus.write(APU_STATUS, 0x00);
        self.regs.pc = self.read_word(bus, RESET_VECTOR);
        self.pending_p = None;
        self.nmi_pending = false;
    }

    /// Raise the NMI line. Serviced at the next instruction boundary.
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Total cycles executed since power-on.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Execute one instruction (servicing a pending NMI first) and return
    /// the cycles consumed.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u8 {
        // Deferred status from the previous instruction lands before
        // anything else this boundary does.
        if let Some(p) = self.pending_p.take() {
            self.regs.p = p;
        }
        self.regs.p.set(U);

        let mut cycles = 0u8;
        if self.nmi_pending {
            self.nmi_pending = false;
            cycles += self.service_nmi(bus);
        }

        self.extra_cycles = 0;
        let opcode = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.dispatch(bus, opcode);
        cycles += CYCLE_TABLE[opcode as usize] + self.extra_cycles;

        self.total_cycles += u64::from(cycles);
        cycles
    }

    fn service_nmi<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.push(bus, (self.regs.pc >> 8) as u8);
        self.push(bus, (self.regs.pc & 0xFF) as u8);
        self.push(bus, self.regs.p.to_byte_irq());
        self.regs.p.set(I);
        self.regs.pc = self.read_word(bus, NMI_VECTOR);
        7
    }

    fn dispatch<B: Bus>(&mut self, bus: &mut B, opcode: u8) {
        match opcode {
            0x00 => self.brk(bus),
            0x01 => self.izx(bus, Self::ora),
            0x05 => self.zp(bus, Self::ora),
            0x06 => self.zp(bus, Self::asl_mem),
            0x08 => self.php(bus),
            0x09 => self.imm(bus, Self::ora),
            0x0A => self.asl_a(),
            0x0D => self.abs(bus, Self::ora),
            0x0E => self.abs(bus, Self::asl_mem),
            0x10 => self.branch(bus, !self.regs.p.is_set(N)), // BPL
            0x11 => self.izy(bus, Self::ora),
            0x15 => self.zpx(bus, Self::ora),
            0x16 => self.zpx(bus, Self::asl_mem),
            0x18 => self.regs.p.clear(C), // CLC
            0x19 => self.aby(bus, Self::ora),
            0x1D => self.abx(bus, Self::ora),
            0x1E => self.abx(bus, Self::asl_mem),
            0x20 => self.abs(bus, Self::jsr),
            0x21 => self.izx(bus, Self::and),
            0x24 => self.zp(bus, Self::bit),
            0x25 => self.zp(bus, Self::and),
            0x26 => self.zp(bus, Self::rol_mem),
            0x28 => self.plp(bus),
            0x29 => self.imm(bus, Self::and),
            0x2A => self.rol_a(),
            0x2C => self.abs(bus, Self::bit),
            0x2D => self.abs(bus, Self::and),
            0x2E => self.abs(bus, Self::rol_mem),
            0x30 => self.branch(bus, self.regs.p.is_set(N)), // BMI
            0x31 => self.izy(bus, Self::and),
            0x35 => self.zpx(bus, Self::and),
            0x36 => self.zpx(bus, Self::rol_mem),
            0x38 => self.regs.p.set(C), // SEC
            0x39 => self.aby(bus, Self::and),
            0x3D => self.abx(bus, Self::and),
            0x3E => self.abx(bus, Self::rol_mem),
            0x40 => self.rti(bus),
            0x41 => self.izx(bus, Self::eor),
            0x45 => self.zp(bus, Self::eor),
            0x46 => self.zp(bus, Self::lsr_mem),
            0x48 => self.pha(bus),
            0x49 => self.imm(bus, Self::eor),
            0x4A => self.lsr_a(),
            0x4C => self.abs(bus, Self::jmp),
            0x4D => self.abs(bus, Self::eor),
            0x4E => self.abs(bus, Self::lsr_mem),
            0x50 => self.branch(bus, !self.regs.p.is_set(V)), // BVC
            0x51 => self.izy(bus, Self::eor),
            0x55 => self.zpx(bus, Self::eor),
            0x56 => self.zpx(bus, Self::lsr_mem),
            0x58 => self.cli(),
            0x59 => self.aby(bus, Self::eor),
            0x5D => self.abx(bus, Self::eor),
            0x5E => self.abx(bus, Self::lsr_mem),
            0x60 => self.rts(bus),
            0x61 => self.izx(bus, Self::adc),
            0x65 => self.zp(bus, Self::adc),
            0x66 => self.zp(bus, Self::ror_mem),
            0x68 => self.pla(bus),
            0x69 => self.imm(bus, Self::adc),
            0x6A => self.ror_a(),
            0x6C => self.ind(bus, Self::jmp),
            0x6D => self.abs(bus, Self::adc),
            0x6E => self.abs(bus, Self::ror_mem),
            0x70 => self.branch(bus, self.regs.p.is_set(V)), // BVS
            0x71 => self.izy(bus, Self::adc),
            0x75 => self.zpx(bus, Self::adc),
            0x76 => self.zpx(bus, Self::ror_mem),
            0x78 => self.sei(),
            0x79 => self.aby(bus, Self::adc),
            0x7D => self.abx(bus, Self::adc),
            0x7E => self.abx(bus, Self::ror_mem),
            0x81 => self.izx(bus, Self::sta),
            0x84 => self.zp(bus, Self::sty),
            0x85 => self.zp(bus, Self::sta),
            0x86 => self.zp(bus, Self::stx),
            0x88 => self.dey(),
            0x8A => self.txa(),
            0x8C => self.abs(bus, Self::sty),
            0x8D => self.abs(bus, Self::sta),
            0x8E => self.abs(bus, Self::stx),
            0x90 => self.branch(bus, !self.regs.p.is_set(C)), // BCC
            0x91 => self.izy(bus, Self::sta),
            0x94 => self.zpx(bus, Self::sty),
            0x95 => self.zpx(bus, Self::sta),
            0x96 => self.zpy(bus, Self::stx),
            0x98 => self.tya(),
            0x99 => self.aby(bus, Self::sta),
            0x9A => self.regs.s = self.regs.x, // TXS (no flags)
            0x9D => self.abx(bus, Self::sta),
            0xA0 => self.imm(bus, Self::ldy),
            0xA1 => self.izx(bus, Self::lda),
            0xA2 => self.imm(bus, Self::ldx),
            0xA4 => self.zp(bus, Self::ldy),
            0xA5 => self.zp(bus, Self::lda),
            0xA6 => self.zp(bus, Self::ldx),
            0xA8 => self.tay(),
            0xA9 => self.imm(bus, Self::lda),
            0xAA => self.tax(),
            0xAC => self.abs(bus, Self::ldy),
            0xAD => self.abs(bus, Self::lda),
            0xAE => self.abs(bus, Self::ldx),
            0xB0 => self.branch(bus, self.regs.p.is_set(C)), // BCS
            0xB1 => self.izy(bus, Self::lda),
            0xB4 => self.zpx(bus, Self::ldy),
            0xB5 => self.zpx(bus, Self::lda),
            0xB6 => self.zpy(bus, Self::ldx),
            0xB8 => self.regs.p.clear(V), // CLV
            0xB9 => self.aby(bus, Self::lda),
            0xBA => self.tsx(),
            0xBC => self.abx(bus, Self::ldy),
            0xBD => self.abx(bus, Self::lda),
            0xBE => self.aby(bus, Self::ldx),
            0xC0 => self.imm(bus, Self::cpy),
            0xC1 => self.izx(bus, Self::cmp),
            0xC4 => self.zp(bus, Self::cpy),
            0xC5 => self.zp(bus, Self::cmp),
            0xC6 => self.zp(bus, Self::dec),
            0xC8 => self.iny(),
            0xC9 => self.imm(bus, Self::cmp),
            0xCA => self.dex(),
            0xCC => self.abs(bus, Self::cpy),
            0xCD => self.abs(bus, Self::cmp),
            0xCE => self.abs(bus, Self::dec),
            0xD0 => self.branch(bus, !self.regs.p.is_set(Z)), // BNE
            0xD1 => self.izy(bus, Self::cmp),
            0xD5 => self.zpx(bus, Self::cmp),
            0xD6 => self.zpx(bus, Self::dec),
            0xD8 => self.regs.p.clear(D), // CLD
            0xD9 => self.aby(bus, Self::cmp),
            0xDD => self.abx(bus, Self::cmp),
            0xDE => self.abx(bus, Self::dec),
            0xE0 => self.imm(bus, Self::cpx),
            0xE1 => self.izx(bus, Self::sbc),
            0xE4 => self.zp(bus, Self::cpx),
            0xE5 => self.zp(bus, Self::sbc),
            0xE6 => self.zp(bus, Self::inc),
            0xE8 => self.inx(),
            0xE9 => self.imm(bus, Self::sbc),
            0xEA => {} // NOP
            0xEC => self.abs(bus, Self::cpx),
            0xED => self.abs(bus, Self::sbc),
            0xEE => self.abs(bus, Self::inc),
            0xF0 => self.branch(bus, self.regs.p.is_set(Z)), // BEQ
            0xF1 => self.izy(bus, Self::sbc),
            0xF5 => self.zpx(bus, Self::sbc),
            0xF6 => self.zpx(bus, Self::inc),
            0xF8 => self.regs.p.set(D), // SED
            0xF9 => self.aby(bus, Self::sbc),
            0xFD => self.abx(bus, Self::sbc),
            0xFE => self.abx(bus, Self::inc),
            _ => panic!(
                "invalid opcode ${opcode:02X} at ${:04X}",
                self.regs.pc.wrapping_sub(1)
            ),
        }
    }

    // === Bus helpers ===

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn read_word<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = bus.read(addr);
        let hi = bus.read(addr.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.regs.push_addr();
        bus.write(addr, value);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let addr = self.regs.pop_addr();
        bus.read(addr)
    }

    /// Charge a +1 penalty when indexing stepped across a page boundary.
    /// The XOR of bit 8 is exact here: an 8-bit index or branch offset can
    /// move the address at most one page.
    fn page_cross_penalty(&mut self, base: u16, addr: u16) {
        if (base ^ addr) & 0x0100 != 0 {
            self.extra_cycles += 1;
        }
    }

    // === Addressing modes ===

    fn imm<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let addr = self.regs.pc;
        self.regs.pc = self.regs.pc.wrapping_add(1);
        op(self, bus, addr);
    }

    fn zp<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let addr = u16::from(self.fetch(bus));
        op(self, bus, addr);
    }

    fn zpx<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let addr = u16::from(self.fetch(bus).wrapping_add(self.regs.x));
        op(self, bus, addr);
    }

    fn zpy<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let addr = u16::from(self.fetch(bus).wrapping_add(self.regs.y));
        op(self, bus, addr);
    }

    fn abs<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        let addr = u16::from(lo) | (u16::from(hi) << 8);
        op(self, bus, addr);
    }

    fn abx<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        let base = u16::from(lo) | (u16::from(hi) << 8);
        let addr = base.wrapping_add(u16::from(self.regs.x));
        self.page_cross_penalty(base, addr);
        op(self, bus, addr);
    }

    fn aby<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        let base = u16::from(lo) | (u16::from(hi) << 8);
        let addr = base.wrapping_add(u16::from(self.regs.y));
        self.page_cross_penalty(base, addr);
        op(self, bus, addr);
    }

    /// Indirect pre-indexed: the pointer lives in the zero page and wraps
    /// there, never escaping into page one.
    fn izx<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let ptr = self.fetch(bus).wrapping_add(self.regs.x);
        let lo = bus.read(u16::from(ptr));
        let hi = bus.read(u16::from(ptr.wrapping_add(1)));
        let addr = u16::from(lo) | (u16::from(hi) << 8);
        op(self, bus, addr);
    }

    /// Indirect post-indexed, with the page-cross penalty.
    fn izy<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let ptr = self.fetch(bus);
        let lo = bus.read(u16::from(ptr));
        let hi = bus.read(u16::from(ptr.wrapping_add(1)));
        let base = u16::from(lo) | (u16::from(hi) << 8);
        let addr = base.wrapping_add(u16::from(self.regs.y));
        self.page_cross_penalty(base, addr);
        op(self, bus, addr);
    }

    /// Absolute indirect (JMP only), reproducing the 6502 defect: when the
    /// pointer's low byte is $FF, the high byte is fetched from the start
    /// of the *same* page rather than the next one.
    fn ind<B: Bus>(&mut self, bus: &mut B, op: OpFn<B>) {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        let ptr = u16::from(lo) | (u16::from(hi) << 8);
        let wrapped = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
        let addr = u16::from(bus.read(ptr)) | (u16::from(bus.read(wrapped)) << 8);
        op(self, bus, addr);
    }

    /// Relative branch: taken costs +1 on the same page, +2 across pages.
    fn branch<B: Bus>(&mut self, bus: &mut B, condition: bool) {
        let offset = self.fetch(bus) as i8;
        let target = self.regs.pc.wrapping_add(offset as u16);
        if condition {
            self.extra_cycles += if (self.regs.pc ^ target) & 0x0100 != 0 {
                2
            } else {
                1
            };
            self.regs.pc = target;
        }
    }

    // === Loads, stores, transfers ===

    fn lda<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.regs.a = bus.read(addr);
        self.regs.p.update_zn(self.regs.a);
    }

    fn ldx<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.regs.x = bus.read(addr);
        self.regs.p.update_zn(self.regs.x);
    }

    fn ldy<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.regs.y = bus.read(addr);
        self.regs.p.update_zn(self.regs.y);
    }

    fn sta<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        bus.write(addr, self.regs.a);
    }

    fn stx<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        bus.write(addr, self.regs.x);
    }

    fn sty<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        bus.write(addr, self.regs.y);
    }

    fn tax(&mut self) {
        self.regs.x = self.regs.a;
        self.regs.p.update_zn(self.regs.x);
    }

    fn tay(&mut self) {
        self.regs.y = self.regs.a;
        self.regs.p.update_zn(self.regs.y);
    }

    fn txa(&mut self) {
        self.regs.a = self.regs.x;
        self.regs.p.update_zn(self.regs.a);
    }

    fn tya(&mut self) {
        self.regs.a = self.regs.y;
        self.regs.p.update_zn(self.regs.a);
    }

    fn tsx(&mut self) {
        self.regs.x = self.regs.s;
        self.regs.p.update_zn(self.regs.x);
    }

    // === Arithmetic and logic ===

    fn adc<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let value = bus.read(addr);
        let carry = u16::from(self.regs.p.is_set(C));
        let sum = u16::from(self.regs.a) + u16::from(value) + carry;
        let result = (sum & 0xFF) as u8;
        // Overflow: operands agree in sign, result disagrees.
        let overflow = (self.regs.a ^ value) & 0x80 == 0 && (self.regs.a ^ result) & 0x80 != 0;
        self.regs.p.set_if(C, sum > 0xFF);
        self.regs.p.set_if(V, overflow);
        self.regs.a = result;
        self.regs.p.update_zn(result);
    }

    fn sbc<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let value = bus.read(addr);
        let borrow = u16::from(!self.regs.p.is_set(C));
        let diff = u16::from(self.regs.a)
            .wrapping_sub(u16::from(value))
            .wrapping_sub(borrow);
        let result = (diff & 0xFF) as u8;
        let overflow = (self.regs.a ^ value) & 0x80 != 0 && (self.regs.a ^ result) & 0x80 != 0;
        self.regs.p.set_if(C, diff <= 0xFF);
        self.regs.p.set_if(V, overflow);
        self.regs.a = result;
        self.regs.p.update_zn(result);
    }

    fn compare<B: Bus>(&mut self, bus: &mut B, addr: u16, register: u8) {
        let value = bus.read(addr);
        let diff = u16::from(register).wrapping_sub(u16::from(value));
        self.regs.p.set_if(C, diff <= 0xFF);
        self.regs.p.update_zn((diff & 0xFF) as u8);
    }

    fn cmp<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.compare(bus, addr, self.regs.a);
    }

    fn cpx<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.compare(bus, addr, self.regs.x);
    }

    fn cpy<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.compare(bus, addr, self.regs.y);
    }

    fn and<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.regs.a &= bus.read(addr);
        self.regs.p.update_zn(self.regs.a);
    }

    fn ora<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.regs.a |= bus.read(addr);
        self.regs.p.update_zn(self.regs.a);
    }

    fn eor<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        self.regs.a ^= bus.read(addr);
        self.regs.p.update_zn(self.regs.a);
    }

    fn bit<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let value = bus.read(addr);
        self.regs.p.set_if(N, value & N != 0);
        self.regs.p.set_if(V, value & V != 0);
        self.regs.p.set_if(Z, value & self.regs.a == 0);
    }

    // === Shifts and rotates ===

    fn asl(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x80 != 0);
        let result = value << 1;
        self.regs.p.update_zn(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.regs.p.set_if(C, value & 0x01 != 0);
        let result = value >> 1;
        self.regs.p.update_zn(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.is_set(C));
        self.regs.p.set_if(C, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.regs.p.update_zn(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.is_set(C)) << 7;
        self.regs.p.set_if(C, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.regs.p.update_zn(result);
        result
    }

    fn asl_a(&mut self) {
        self.regs.a = self.asl(self.regs.a);
    }

    fn lsr_a(&mut self) {
        self.regs.a = self.lsr(self.regs.a);
    }

    fn rol_a(&mut self) {
        self.regs.a = self.rol(self.regs.a);
    }

    fn ror_a(&mut self) {
        self.regs.a = self.ror(self.regs.a);
    }

    fn asl_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let result = self.asl(bus.read(addr));
        bus.write(addr, result);
    }

    fn lsr_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let result = self.lsr(bus.read(addr));
        bus.write(addr, result);
    }

    fn rol_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let result = self.rol(bus.read(addr));
        bus.write(addr, result);
    }

    fn ror_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let result = self.ror(bus.read(addr));
        bus.write(addr, result);
    }

    // === Increments and decrements ===

    fn inc<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let result = bus.read(addr).wrapping_add(1);
        bus.write(addr, result);
        self.regs.p.update_zn(result);
    }

    fn dec<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        let result = bus.read(addr).wrapping_sub(1);
        bus.write(addr, result);
        self.regs.p.update_zn(result);
    }

    fn inx(&mut self) {
        self.regs.x = self.regs.x.wrapping_add(1);
        self.regs.p.update_zn(self.regs.x);
    }

    fn iny(&mut self) {
        self.regs.y = self.regs.y.wrapping_add(1);
        self.regs.p.update_zn(self.regs.y);
    }

    fn dex(&mut self) {
        self.regs.x = self.regs.x.wrapping_sub(1);
        self.regs.p.update_zn(self.regs.x);
    }

    fn dey(&mut self) {
        self.regs.y = self.regs.y.wrapping_sub(1);
        self.regs.p.update_zn(self.regs.y);
    }

    // === Stack and status ===

    fn pha<B: Bus>(&mut self, bus: &mut B) {
        self.push(bus, self.regs.a);
    }

    fn pla<B: Bus>(&mut self, bus: &mut B) {
        self.regs.a = self.pop(bus);
        self.regs.p.update_zn(self.regs.a);
    }

    fn php<B: Bus>(&mut self, bus: &mut B) {
        // PHP always pushes with the break bit set.
        self.push(bus, self.regs.p.to_byte_brk());
    }

    fn plp<B: Bus>(&mut self, bus: &mut B) {
        let value = Status::from_byte(self.pop(bus));
        self.set_p_deferred_i(value);
    }

    fn cli(&mut self) {
        let mut p = self.regs.p;
        p.clear(I);
        self.set_p_deferred_i(p);
    }

    fn sei(&mut self) {
        let mut p = self.regs.p;
        p.set(I);
        self.set_p_deferred_i(p);
    }

    /// Apply a new status with the I bit held back one instruction:
    /// everything else lands now, the full value (I included) is parked
    /// in the one-slot pending register for the next step boundary.
    fn set_p_deferred_i(&mut self, new_p: Status) {
        let old_i = self.regs.p.is_set(I);
        self.regs.p = new_p;
        self.regs.p.set_if(I, old_i);
        self.pending_p = Some(new_p);
    }

    // === Flow control ===

    fn jmp<B: Bus>(&mut self, _bus: &mut B, addr: u16) {
        self.regs.pc = addr;
    }

    fn jsr<B: Bus>(&mut self, bus: &mut B, addr: u16) {
        // Pushes the address of the last byte of the JSR instruction;
        // RTS adds one back.
        let return_addr = self.regs.pc.wrapping_sub(1);
        self.push(bus, (return_addr >> 8) as u8);
        self.push(bus, (return_addr & 0xFF) as u8);
        self.regs.pc = addr;
    }

    fn rts<B: Bus>(&mut self, bus: &mut B) {
        let lo = self.pop(bus);
        let hi = self.pop(bus);
        self.regs.pc = (u16::from(lo) | (u16::from(hi) << 8)).wrapping_add(1);
    }

    fn rti<B: Bus>(&mut self, bus: &mut B) {
        self.regs.p = Status::from_byte(self.pop(bus));
        let lo = self.pop(bus);
        let hi = self.pop(bus);
        self.regs.pc = u16::from(lo) | (u16::from(hi) << 8);
    }

    fn brk<B: Bus>(&mut self, bus: &mut B) {
        // BRK skips its signature byte before pushing the return address.
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.push(bus, (self.regs.pc >> 8) as u8);
        self.push(bus, (self.regs.pc & 0xFF) as u8);
        self.push(bus, self.regs.p.to_byte_brk());
        self.regs.p.set(I);
        self.regs.pc = self.read_word(bus, BRK_VECTOR);
    }
}

impl Observable for Ricoh2a03 {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "x" => Some(self.regs.x.into()),
            "y" => Some(self.regs.y.into()),
            "s" => Some(self.regs.s.into()),
            "p" => Some(self.regs.p.0.into()),
            "cycles" => Some(self.total_cycles.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["pc", "a", "x", "y", "s", "p", "cycles"]
    }
}
