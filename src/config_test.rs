use super::*;

#[test]
fn price_ids_split_and_trimmed() {
    let ids = parse_price_ids("price_pro, price_enterprise ,,");
    assert_eq!(ids, vec!["price_pro".to_string(), "price_enterprise".to_string()]);
}

#[test]
fn price_ids_empty_input_yields_empty_list() {
    assert!(parse_price_ids("").is_empty());
    assert!(parse_price_ids(" , ").is_empty());
}
