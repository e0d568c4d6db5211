//! MQ arithmetic coder.
//!
//! The adaptive binary arithmetic coder shared by every JBIG2 region type.
//! Each context is a small state machine indexing the probability
//! estimation table; decoders and encoders update contexts identically, so
//! a stream encoded with one set of contexts decodes with a fresh set.

use lazy_static::lazy_static;

/// One row of the probability estimation table.
#[derive(Debug, Clone, Copy)]
struct Qe {
    qe: u32,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

const fn qe(qe: u32, nmps: u8, nlps: u8, switch: bool) -> Qe {
    Qe { qe, nmps, nlps, switch }
}

lazy_static! {
    static ref QE_TABLE: [Qe; 47] = [
        qe(0x5601, 1, 1, true),
        qe(0x3401, 2, 6, false),
        qe(0x1801, 3, 9, false),
        qe(0x0AC1, 4, 12, false),
        qe(0x0521, 5, 29, false),
        qe(0x0221, 38, 33, false),
        qe(0x5601, 7, 6, true),
        qe(0x5401, 8, 14, false),
        qe(0x4801, 9, 14, false),
        qe(0x3801, 10, 14, false),
        qe(0x3001, 11, 17, false),
        qe(0x2401, 12, 18, false),
        qe(0x1C01, 13, 20, false),
        qe(0x1601, 29, 21, false),
        qe(0x5601, 15, 14, true),
        qe(0x5401, 16, 14, false),
        qe(0x5101, 17, 15, false),
        qe(0x4801, 18, 16, false),
        qe(0x3801, 19, 17, false),
        qe(0x3401, 20, 18, false),
        qe(0x3001, 21, 19, false),
        qe(0x2801, 22, 19, false),
        qe(0x2401, 23, 20, false),
        qe(0x2201, 24, 21, false),
        qe(0x1C01, 25, 22, false),
        qe(0x1801, 26, 23, false),
        qe(0x1601, 27, 24, false),
        qe(0x1401, 28, 25, false),
        qe(0x1201, 29, 26, false),
        qe(0x1101, 30, 27, false),
        qe(0x0AC1, 31, 28, false),
        qe(0x09C1, 32, 29, false),
        qe(0x08A1, 33, 30, false),
        qe(0x0521, 34, 31, false),
        qe(0x0441, 35, 32, false),
        qe(0x02A1, 36, 33, false),
        qe(0x0221, 37, 34, false),
        qe(0x0141, 38, 35, false),
        qe(0x0111, 39, 36, false),
        qe(0x0085, 40, 37, false),
        qe(0x0049, 41, 38, false),
        qe(0x0025, 42, 39, false),
        qe(0x0015, 43, 40, false),
        qe(0x0009, 44, 41, false),
        qe(0x0005, 45, 42, false),
        qe(0x0001, 45, 43, false),
        qe(0x5601, 46, 46, false),
    ];
}

/// Adaptive probability state of one coding context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArithCtx {
    mps: u32,
    index: u8,
}

impl ArithCtx {
    /// Current more probable symbol.
    pub fn mps(&self) -> u32 {
        self.mps
    }

    /// Current row of the estimation table.
    pub fn index(&self) -> u8 {
        self.index
    }

    fn qe(&self) -> Qe {
        QE_TABLE[self.index as usize]
    }

    fn decode_nlps(&mut self, qe: Qe) -> u32 {
        let d = 1 - self.mps;
        if qe.switch {
            self.mps = 1 - self.mps;
        }
        self.index = qe.nlps;
        d
    }

    fn decode_nmps(&mut self, qe: Qe) -> u32 {
        self.index = qe.nmps;
        self.mps
    }
}

/// A fresh context table of `size` entries.
pub fn new_contexts(size: usize) -> Vec<ArithCtx> {
    vec![ArithCtx::default(); size]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    DataAvailable,
    DecodingFinished,
    Looping,
}

/// MQ decoder over a byte slice.
///
/// Reading past the end feeds `0xFF` bytes. Once the read position runs off
/// the end of the data, or the end-of-data marker has been seen twice, the
/// decoder reports [`is_complete`](Self::is_complete) and region decoders
/// stop instead of spinning on padding.
#[derive(Debug, Clone)]
pub struct ArithDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    b: u8,
    c: u32,
    a: u32,
    ct: u32,
    state: StreamState,
    complete: bool,
}

impl<'a> ArithDecoder<'a> {
    /// Start decoding `data`.
    pub fn new(data: &'a [u8]) -> Self {
        let mut decoder = Self {
            data,
            pos: 0,
            b: 0,
            c: 0,
            a: 0x8000,
            ct: 0,
            state: StreamState::DataAvailable,
            complete: false,
        };
        decoder.b = decoder.cur_byte();
        decoder.c = u32::from(decoder.b ^ 0xFF) << 16;
        decoder.byte_in();
        decoder.c <<= 7;
        decoder.ct = decoder.ct.saturating_sub(7);
        decoder.a = 0x8000;
        decoder
    }

    /// True once the decoder ran out of data.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Decode one bit in context `cx`.
    pub fn decode(&mut self, cx: &mut ArithCtx) -> u32 {
        let qe = cx.qe();
        self.a = self.a.wrapping_sub(qe.qe);
        if (self.c >> 16) < self.a {
            if self.a & 0x8000 != 0 {
                return cx.mps;
            }
            let d = if self.a < qe.qe {
                cx.decode_nlps(qe)
            } else {
                cx.decode_nmps(qe)
            };
            self.renormalize();
            return d;
        }
        self.c = self.c.wrapping_sub(self.a << 16);
        let d = if self.a < qe.qe {
            cx.decode_nmps(qe)
        } else {
            cx.decode_nlps(qe)
        };
        self.a = qe.qe;
        self.renormalize();
        d
    }

    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    fn byte_in(&mut self) {
        if self.b == 0xFF {
            let next = self.next_byte();
            if next > 0x8F {
                self.ct = 8;
                match self.state {
                    StreamState::DataAvailable => self.state = StreamState::DecodingFinished,
                    // One more read is allowed after the marker.
                    StreamState::DecodingFinished => self.state = StreamState::Looping,
                    StreamState::Looping => self.mark_complete(),
                }
            } else {
                self.advance();
                self.b = next;
                self.c = self.c.wrapping_add(0xFE00).wrapping_sub(u32::from(self.b) << 9);
                self.ct = 7;
            }
        } else {
            self.advance();
            self.b = self.cur_byte();
            self.c = self.c.wrapping_add(0xFF00).wrapping_sub(u32::from(self.b) << 8);
            self.ct = 8;
        }
        if self.pos >= self.data.len() {
            self.mark_complete();
        }
    }

    fn mark_complete(&mut self) {
        if !self.complete {
            log::debug!("Arithmetic decoder exhausted at byte {}", self.pos);
        }
        self.complete = true;
    }

    fn cur_byte(&self) -> u8 {
        self.data.get(self.pos).copied().unwrap_or(0xFF)
    }

    fn next_byte(&self) -> u8 {
        self.data.get(self.pos + 1).copied().unwrap_or(0xFF)
    }

    fn advance(&mut self) {
        if self.pos < self.data.len() {
            self.pos += 1;
        }
    }
}

/// MQ encoder producing a stream terminated by the `0xFF 0xAC` marker.
#[derive(Debug, Clone)]
pub struct ArithEncoder {
    a: u32,
    c: u32,
    ct: u32,
    // The first byte is a placeholder for the byte before the stream.
    out: Vec<u8>,
}

impl Default for ArithEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArithEncoder {
    /// Empty encoder.
    pub fn new() -> Self {
        Self {
            a: 0x8000,
            c: 0,
            ct: 12,
            out: vec![0],
        }
    }

    /// Encode bit `d` in context `cx`.
    pub fn encode(&mut self, cx: &mut ArithCtx, d: u32) {
        let qe = cx.qe();
        if d == cx.mps {
            self.code_mps(cx, qe);
        } else {
            self.code_lps(cx, qe);
        }
    }

    fn code_mps(&mut self, cx: &mut ArithCtx, qe: Qe) {
        self.a -= qe.qe;
        if self.a & 0x8000 == 0 {
            if self.a < qe.qe {
                self.a = qe.qe;
            } else {
                self.c += qe.qe;
            }
            cx.index = qe.nmps;
            self.renormalize();
        } else {
            self.c += qe.qe;
        }
    }

    fn code_lps(&mut self, cx: &mut ArithCtx, qe: Qe) {
        self.a -= qe.qe;
        if self.a < qe.qe {
            self.c += qe.qe;
        } else {
            self.a = qe.qe;
        }
        if qe.switch {
            cx.mps = 1 - cx.mps;
        }
        cx.index = qe.nlps;
        self.renormalize();
    }

    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out();
            }
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    fn last(&mut self) -> &mut u8 {
        let idx = self.out.len() - 1;
        &mut self.out[idx]
    }

    fn byte_out(&mut self) {
        if *self.last() == 0xFF {
            self.out.push((self.c >> 20) as u8);
            self.c &= 0xFFFFF;
            self.ct = 7;
        } else if self.c < 0x800_0000 {
            self.out.push((self.c >> 19) as u8);
            self.c &= 0x7FFFF;
            self.ct = 8;
        } else {
            *self.last() = self.last().wrapping_add(1);
            if *self.last() == 0xFF {
                self.c &= 0x7FF_FFFF;
                self.out.push((self.c >> 20) as u8);
                self.c &= 0xFFFFF;
                self.ct = 7;
            } else {
                self.out.push((self.c >> 19) as u8);
                self.c &= 0x7FFFF;
                self.ct = 8;
            }
        }
    }

    /// Flush the coder and return the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let temp = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= temp {
            self.c -= 0x8000;
        }
        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();
        if *self.last() != 0xFF {
            self.out.push(0xFF);
        }
        self.out.push(0xAC);
        self.out.split_off(1)
    }
}
