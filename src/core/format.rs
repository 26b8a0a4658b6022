/// Renders an integer with `,` thousands separators, e.g. `52400` -> `52,400`.
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn dollars(value: u64) -> String {
    format!("${}", thousands(value))
}
