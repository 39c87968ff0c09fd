//! A small `strptime`-subset parser for `--date-format`.
//!
//! Only `%Y`, `%m`, `%d`, `%H`, `%M`, `%S` and literal separator
//! characters are supported — enough to parse the default
//! `%Y-%m-%d %H:%M:%S` and anything built from the same fields. There is
//! no libc `strptime` binding and no date/time crate in this crate's
//! dependency set, so this is hand-rolled.

#[derive(Clone, Copy)]
enum Token {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Literal(char),
}

fn tokenize(fmt: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.next() {
                Some('Y') => tokens.push(Token::Year),
                Some('m') => tokens.push(Token::Month),
                Some('d') => tokens.push(Token::Day),
                Some('H') => tokens.push(Token::Hour),
                Some('M') => tokens.push(Token::Minute),
                Some('S') => tokens.push(Token::Second),
                Some(other) => return Err(format!("unsupported date-format field %{other}")),
                None => return Err("date-format ends with a dangling %".to_string()),
            }
        } else {
            tokens.push(Token::Literal(c));
        }
    }
    Ok(tokens)
}

fn take_digits(input: &[u8], pos: &mut usize, max_digits: usize) -> Result<i64, String> {
    let start = *pos;
    let mut n = 0;
    while *pos < input.len() && input[*pos].is_ascii_digit() && n < max_digits {
        *pos += 1;
        n += 1;
    }
    if n == 0 {
        return Err("expected a digit in date input".to_string());
    }
    std::str::from_utf8(&input[start..*pos])
        .unwrap()
        .parse::<i64>()
        .map_err(|e| e.to_string())
}

/// Days since the Unix epoch for a given proleptic Gregorian calendar
/// date, via Howard Hinnant's `days_from_civil` algorithm.
fn days_from_civil(y: i64, m: i64, d: i64) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// Parses `input` against `fmt`, returning a Unix timestamp in seconds
/// (UTC — this crate does not model local time zones).
pub fn parse_date(fmt: &str, input: &str) -> Result<i64, String> {
    let tokens = tokenize(fmt)?;
    let bytes = input.as_bytes();
    let mut pos = 0;

    let mut year = 1970i64;
    let mut month = 1i64;
    let mut day = 1i64;
    let mut hour = 0i64;
    let mut minute = 0i64;
    let mut second = 0i64;

    for token in tokens {
        match token {
            Token::Year => year = take_digits(bytes, &mut pos, 4)?,
            Token::Month => month = take_digits(bytes, &mut pos, 2)?,
            Token::Day => day = take_digits(bytes, &mut pos, 2)?,
            Token::Hour => hour = take_digits(bytes, &mut pos, 2)?,
            Token::Minute => minute = take_digits(bytes, &mut pos, 2)?,
            Token::Second => second = take_digits(bytes, &mut pos, 2)?,
            Token::Literal(c) => {
                let got = bytes
                    .get(pos)
                    .map(|&b| b as char)
                    .ok_or_else(|| format!("date input ended early, expected '{c}'"))?;
                if got != c {
                    return Err(format!("date input has '{got}' where '{c}' was expected"));
                }
                pos += c.len_utf8();
            }
        }
    }

    let days = days_from_civil(year, month, day);
    Ok(days * 86400 + hour * 3600 + minute * 60 + second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_format() {
        let ts = parse_date("%Y-%m-%d %H:%M:%S", "1970-01-01 00:00:00").unwrap();
        assert_eq!(ts, 0);
    }

    #[test]
    fn parses_a_later_date() {
        let ts = parse_date("%Y-%m-%d %H:%M:%S", "2020-01-01 00:00:00").unwrap();
        assert_eq!(ts, 1577836800);
    }

    #[test]
    fn rejects_mismatched_literal() {
        assert!(parse_date("%Y-%m-%d", "2020/01/01").is_err());
    }

    #[test]
    fn rejects_unsupported_field() {
        assert!(parse_date("%Y-%m-%d %Z", "2020-01-01 x").is_err());
    }

    #[test]
    fn date_only_format_defaults_time_to_midnight() {
        let ts = parse_date("%Y-%m-%d", "2020-01-02").unwrap();
        assert_eq!(ts, 1577836800 + 86400);
    }
}
