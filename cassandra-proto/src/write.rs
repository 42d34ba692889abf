use bytes::BufMut;

pub fn string(buf: &mut impl BufMut, value: &str) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

pub fn short_bytes(buf: &mut impl BufMut, value: &[u8]) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
}
