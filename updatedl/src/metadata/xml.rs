//! Parser for the update server's `titlepatch` XML documents.
//!
//! ```xml
//! <titlepatch titleid="NPUA80662">
//!   <tag name="..." popup="true" signoff="true">
//!     <package version="01.08" size="19340112" sha1sum="0649..." url="http://..." ps3_system_ver="03.7000">
//!       <paramsfo>
//!         <TITLE>LittleBigPlanet™2 Digital Version</TITLE>
//!         <TITLE_02>LittleBigPlanet™2 (version digitale)</TITLE_02>
//!       </paramsfo>
//!     </package>
//!     <package version="01.09" ... />
//!   </tag>
//! </titlepatch>
//! ```
//!
//! Only the first `paramsfo` block contributes title names. Attribute
//! values are collected as-is; validation happens in
//! [`crate::descriptor::Descriptor::from_raw`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::descriptor::RawDescriptor;

/// Contents of a `titlepatch` document before validation.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct TitlePatch {
    pub titles: Vec<String>,
    pub packages: Vec<RawDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamSfo {
    NotSeen,
    Inside,
    Done,
}

/// Parse a `titlepatch` document.
///
/// Returns a human-readable reason on failure.
pub(crate) fn parse_title_patch(document: &str) -> Result<TitlePatch, String> {
    if document.trim().is_empty() {
        return Err("empty response".to_string());
    }

    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut patch = TitlePatch::default();
    let mut saw_root = false;
    let mut paramsfo = ParamSfo::NotSeen;
    let mut in_title = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(element) => match element.name().as_ref() {
                b"titlepatch" => saw_root = true,
                b"package" => patch.packages.push(package_attributes(&element)?),
                b"paramsfo" if paramsfo == ParamSfo::NotSeen => paramsfo = ParamSfo::Inside,
                name if paramsfo == ParamSfo::Inside && name.starts_with(b"TITLE") => {
                    in_title = true
                }
                _ => {}
            },
            Event::Empty(element) => match element.name().as_ref() {
                b"titlepatch" => saw_root = true,
                b"package" => patch.packages.push(package_attributes(&element)?),
                _ => {}
            },
            Event::Text(text) if in_title => {
                let text = text.unescape().map_err(|e| e.to_string())?;
                let text = text.trim();
                if !text.is_empty() {
                    patch.titles.push(text.to_string());
                }
            }
            Event::End(element) => match element.name().as_ref() {
                b"paramsfo" if paramsfo == ParamSfo::Inside => paramsfo = ParamSfo::Done,
                name if name.starts_with(b"TITLE") => in_title = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err("missing <titlepatch> element".to_string());
    }

    Ok(patch)
}

fn package_attributes(element: &BytesStart<'_>) -> Result<RawDescriptor, String> {
    let mut raw = RawDescriptor::default();

    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| format!("bad package attribute: {}", e))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| format!("bad package attribute: {}", e))?
            .into_owned();

        match attribute.key.as_ref() {
            b"version" => raw.version = Some(value),
            b"size" => raw.size = Some(value),
            b"sha1sum" => raw.checksum = Some(value),
            b"url" => raw.url = Some(value),
            b"ps3_system_ver" => raw.system_version = Some(value),
            _ => {}
        }
    }

    Ok(raw)
}
