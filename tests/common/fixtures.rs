//! Catalog XML payloads.

/// `<Item>` with a primary image set of two renditions and the given UPCs.
#[allow(dead_code)]
pub fn item_xml(asin: &str, upcs: &[&str]) -> String {
    let upc = upcs.first().copied().unwrap_or_default();
    let list: String = upcs
        .iter()
        .map(|u| format!("<UPCListElement>{u}</UPCListElement>"))
        .collect();
    format!(
        r#"<Item>
  <ASIN>{asin}</ASIN>
  <ImageSets>
    <ImageSet Category="primary">
      <SmallImage><URL>https://images.example/{asin}-s.jpg</URL><Height Units="pixels">75</Height><Width Units="pixels">60</Width></SmallImage>
      <LargeImage><URL>https://images.example/{asin}-l.jpg</URL><Height Units="pixels">500</Height><Width Units="pixels">400</Width></LargeImage>
    </ImageSet>
  </ImageSets>
  <ItemAttributes>
    <Title>Item {asin}</Title>
    <UPC>{upc}</UPC>
    <UPCList>{list}</UPCList>
  </ItemAttributes>
</Item>"#
    )
}

#[allow(dead_code)]
pub fn items_response(root: &str, items: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" ?>
<{root} xmlns="http://webservices.amazon.com/AWSECommerceService/2013-08-01">
  <Items>
    <Request><IsValid>True</IsValid></Request>
    {}
  </Items>
</{root}>"#,
        items.join("\n")
    )
}

#[allow(dead_code)]
pub fn no_match_response() -> String {
    request_error_response("ItemLookupResponse", "AWS.ECommerceService.NoExactMatches")
}

/// Request-level error envelope with no items, as sent for `code`.
#[allow(dead_code)]
pub fn request_error_response(root: &str, code: &str) -> String {
    format!(
        r#"<?xml version="1.0" ?>
<{root} xmlns="http://webservices.amazon.com/AWSECommerceService/2013-08-01">
  <Items>
    <Request>
      <IsValid>True</IsValid>
      <Errors><Error><Code>{code}</Code><Message>No items for this request.</Message></Error></Errors>
    </Request>
  </Items>
</{root}>"#
    )
}
