/// Test fixtures: representative payloads from CEMADEN and the flat files.
///
/// Recent-data response shape (array or single object):
///   codestacao — station code ("261160609A")
///   nome       — station name, may be absent
///   datahora   — UTC, "YYYY-MM-DD HH:MM:SS.f"
///   id_sensor  — number or string (10 = rain gauge)
///   valor      — mm, number or string (decimal comma possible)
///
/// Historical rain exports are `;`-separated with decimal commas. Tide
/// tables list one high or low tide per row.

/// Imbiribeira, three readings. The last entry has no `nome` and a
/// string sensor id.
#[cfg(test)]
pub(crate) fn fixture_recent_array_json() -> &'static str {
    r#"[
      {
        "codestacao": "261160609A",
        "nome": "Imbiribeira",
        "datahora": "2025-05-14 13:00:00.0",
        "id_sensor": 10,
        "valor": 0.2
      },
      {
        "codestacao": "261160609A",
        "nome": "Imbiribeira",
        "datahora": "2025-05-14 13:10:00.0",
        "id_sensor": 10,
        "valor": 0.0
      },
      {
        "codestacao": "261160609A",
        "datahora": "2025-05-14 13:20:00.0",
        "id_sensor": "10",
        "valor": 1.0
      }
    ]"#
}

/// RECIFE - APAC answering with a bare object.
#[cfg(test)]
pub(crate) fn fixture_recent_object_json() -> &'static str {
    r#"{
      "codestacao": "261160623A",
      "nome": "RECIFE - APAC",
      "datahora": "2025-05-14 13:10:00.0",
      "id_sensor": 10,
      "valor": "1,4"
    }"#
}

#[cfg(test)]
pub(crate) fn fixture_token_json() -> &'static str {
    r#"{"token": "eyJhbGciOi.test.token"}"#
}

/// Historical export: two stations, one row with an empty value and one
/// from the wind sensor.
#[cfg(test)]
pub(crate) fn fixture_rain_csv() -> &'static str {
    "codEstacao;nomeEstacao;datahora;valorMedida;id_sensor\n\
     261160609A;Imbiribeira;2025-05-14 14:00:00.0;1,0;10\n\
     261160609A;Imbiribeira;2025-05-14 14:20:00.0;0,4;10\n\
     261160614A;Campina do Barreto;2025-05-14 14:10:00.0;2,2;10\n\
     261160614A;Campina do Barreto;2025-05-14 14:30:00.0;;10\n\
     261160614A;Campina do Barreto;2025-05-14 14:30:00.0;3,1;20\n"
}

/// One day of tides, `;`-separated, `altura` header.
#[cfg(test)]
pub(crate) fn fixture_tide_csv_semicolon() -> &'static str {
    "data;hora;altura\n\
     14/05/2025;03:47;2,1\n\
     14/05/2025;09:58;0,4\n\
     14/05/2025;16:10;2,0\n\
     14/05/2025;22:31;0,5\n"
}

/// Same tides, `,`-separated, `altura_m` header with upper-case names.
#[cfg(test)]
pub(crate) fn fixture_tide_csv_comma() -> &'static str {
    "Data,Hora,Altura_m\n\
     14/05/2025,03:47,2.1\n\
     14/05/2025,09:58,0.4\n\
     14/05/2025,16:10,2.0\n\
     14/05/2025,22:31\n"
}
