//! Interrupt-driven USART0 transmitter for the diagnostic log

use avr_device::atmega128::{CPU, USART0};
use avr_device::interrupt::Mutex;
use core::cell::RefCell;

use crate::config::{CPU_FREQ_HZ, UART_BAUD};

const QUEUE_LEN: u8 = 64;

const UBRR: u16 = (CPU_FREQ_HZ / (16 * UART_BAUD) - 1) as u16;

const UDRE0: u8 = 1 << 5;
const TXC0: u8 = 1 << 6;
const TXEN0: u8 = 1 << 3;
const UDRIE0: u8 = 1 << 5;
/// 8 data bits, no parity, 1 stop bit
const UCSZ_8N1: u8 = 0x06;

const SREG_I: u8 = 1 << 7;

/// Bounded wait for the shift register after the last byte
const TX_COMPLETE_POLLS: u16 = 20_000;

/// Bytes waiting for the transmitter, oldest at `head`
struct TxQueue {
    bytes: [u8; QUEUE_LEN as usize],
    head: u8,
    len: u8,
}

impl TxQueue {
    const fn new() -> Self {
        Self {
            bytes: [0; QUEUE_LEN as usize],
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, byte: u8) -> bool {
        if self.len == QUEUE_LEN {
            return false;
        }
        let tail = (self.head + self.len) % QUEUE_LEN;
        self.bytes[tail as usize] = byte;
        self.len += 1;
        true
    }

    fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.bytes[self.head as usize];
        self.head = (self.head + 1) % QUEUE_LEN;
        self.len -= 1;
        Some(byte)
    }
}

static TX_QUEUE: Mutex<RefCell<TxQueue>> = Mutex::new(RefCell::new(TxQueue::new()));

pub struct Uart {
    _private: (),
}

impl Uart {
    pub fn new() -> Self {
        unsafe {
            let p = USART0::ptr();
            (*p).ubrr0h.write(|w| w.bits((UBRR >> 8) as u8));
            (*p).ubrr0l.write(|w| w.bits(UBRR as u8));
            (*p).ucsr0c.write(|w| w.bits(UCSZ_8N1));
            (*p).ucsr0b.write(|w| w.bits(TXEN0));
        }
        Self { _private: () }
    }

    /// Queue a byte; when the queue is full and nothing drains it, send directly
    pub fn write_byte(&mut self, byte: u8) {
        loop {
            let queued = avr_device::interrupt::free(|cs| TX_QUEUE.borrow(cs).borrow_mut().push(byte));
            if queued {
                unsafe {
                    (*USART0::ptr()).ucsr0b.modify(|r, w| w.bits(r.bits() | UDRIE0));
                }
                return;
            }
            if !Self::interrupt_driven() {
                Self::send_next_blocking();
            }
        }
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
    }

    /// Send everything still queued by polling, then wait for the last stop bit
    pub fn drain(&mut self) {
        unsafe {
            (*USART0::ptr()).ucsr0b.modify(|r, w| w.bits(r.bits() & !UDRIE0));
        }
        while Self::send_next_blocking() {}

        for _ in 0..TX_COMPLETE_POLLS {
            if unsafe { (*USART0::ptr()).ucsr0a.read().bits() } & TXC0 != 0 {
                break;
            }
        }
    }

    fn interrupt_driven() -> bool {
        unsafe {
            let sreg = (*CPU::ptr()).sreg.read().bits();
            let ucsr0b = (*USART0::ptr()).ucsr0b.read().bits();
            sreg & SREG_I != 0 && ucsr0b & UDRIE0 != 0
        }
    }

    fn send_next_blocking() -> bool {
        let next = avr_device::interrupt::free(|cs| TX_QUEUE.borrow(cs).borrow_mut().pop());
        let Some(byte) = next else {
            return false;
        };
        unsafe {
            let p = USART0::ptr();
            while (*p).ucsr0a.read().bits() & UDRE0 == 0 {}
            // writing TXC0 clears it
            (*p).ucsr0a.modify(|r, w| w.bits(r.bits() | TXC0));
            (*p).udr0.write(|w| w.bits(byte));
        }
        true
    }
}

#[avr_device::interrupt(atmega128)]
fn USART0_UDRE() {
    avr_device::interrupt::free(|cs| {
        if let Some(byte) = TX_QUEUE.borrow(cs).borrow_mut().pop() {
            unsafe {
                (*USART0::ptr()).udr0.write(|w| w.bits(byte));
            }
        } else {
            // queue empty: stop the data-register-empty interrupt
            unsafe {
                (*USART0::ptr()).ucsr0b.modify(|r, w| w.bits(r.bits() & !UDRIE0));
            }
        }
    });
}
