// Single width glyphs so controls keep a predictable layout in the terminal.

pub fn icon(name: &str) -> &'static str {
    match name {
        "chevronDown" => "▾",
        "chevronRight" => "›",
        "columns" => "▥",
        "contains" => "∋",
        "notContains" => "∌",
        "empty" => "○",
        "notEmpty" => "●",
        "ends" => "⊣",
        "notEnds" => "⊬",
        "equal" => "=",
        "notEqual" => "≠",
        "starts" => "⊢",
        "notStarts" => "⊭",
        "menu" => "≡",
        "search" => "⌕",
        "x" => "×",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_icons_fall_back() {
        assert_eq!(icon("contains"), "∋");
        assert_eq!(icon("doesNotExist"), "?");
    }
}
