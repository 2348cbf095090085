//! Response lines written over the UART stream.

use iostream_uart::IoStream;
use iostream_uart::iostream::response::{Field, ResponsePrinter, format_float};

use super::mock_hw::Harness;

#[test]
fn response_line_gets_crlf_on_the_wire() {
    let h = Harness::with_len(16);
    let printer = ResponsePrinter::new(&h.stream);
    printer
        .response(Some("rx"), &[Field::new("len", &4), Field::new("ok", &true)])
        .unwrap();
    assert_eq!(h.uart.tx(), b"{{(rx)}{len:4}{ok:true}}\r\n");
}

#[test]
fn header_and_rows() {
    let h = Harness::with_len(16);
    let printer = ResponsePrinter::new(&h.stream);
    let temp = format_float(21.456, 1).unwrap();
    printer.header(Some("sensor"), &["id", "temp"]).unwrap();
    printer.multi(&[&1, &temp.as_str()]).unwrap();
    assert_eq!(
        String::from_utf8(h.uart.tx()).unwrap(),
        "#{{(sensor)}{id}{temp}}\r\n{{1}{21.5}}\r\n"
    );
}

#[test]
fn error_line_over_stream() {
    let h = Harness::with_len(16);
    let printer = ResponsePrinter::new(&h.stream);
    printer.error(Some("cfg"), 7, format_args!("bad value {}", -1)).unwrap();
    assert_eq!(
        String::from_utf8(h.uart.tx()).unwrap(),
        "{{(cfg)}{error:bad value -1}{errorCode:7}}\r\n"
    );
}

#[test]
fn printer_echoes_what_was_read() {
    let h = Harness::with_len(16);
    h.rx(b"ping");
    let mut buf = [0u8; 8];
    let n = h.stream.read(&mut buf).unwrap();
    let text = core::str::from_utf8(&buf[..n]).unwrap();
    ResponsePrinter::new(&h.stream)
        .response(Some("echo"), &[Field::new("line", &text)])
        .unwrap();
    assert_eq!(h.uart.tx(), b"{{(echo)}{line:ping}}\r\n");
}
